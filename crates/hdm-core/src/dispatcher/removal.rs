//! Best-effort deletion of download files.
//!
//! Deletion is retried for a bounded time (a file may be held open elsewhere);
//! whatever still exists after that is queued for [`remove_deferred`], meant to
//! run once at process exit.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use crate::config::RemovalConfig;

static DEFERRED: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

fn try_remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn defer(path: PathBuf) {
    tracing::warn!("could not delete {}; deferring to exit", path.display());
    DEFERRED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(path);
}

/// Retries deletion of `path` until it is gone or the timeout passes. True if gone.
pub(super) fn remove_with_retry(path: &Path, config: &RemovalConfig) -> bool {
    let deadline = Instant::now() + config.timeout();
    loop {
        match try_remove(path) {
            Ok(()) => return true,
            Err(e) if Instant::now() >= deadline => {
                tracing::debug!("giving up on {}: {}", path.display(), e);
                return false;
            }
            Err(_) => thread::sleep(config.retry_interval()),
        }
    }
}

/// Deletes `paths` on a background thread, deferring the ones that resist.
pub(super) fn spawn_removal(paths: Vec<PathBuf>, config: RemovalConfig) {
    if paths.is_empty() {
        return;
    }
    let spawned = thread::Builder::new()
        .name("hdm-removal".into())
        .spawn(move || {
            for path in paths {
                if !remove_with_retry(&path, &config) {
                    defer(path);
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!("failed to spawn removal thread: {}", e);
    }
}

/// Single attempt per path; failures are deferred.
pub(super) fn remove_now(paths: Vec<PathBuf>) {
    for path in paths {
        if try_remove(&path).is_err() {
            defer(path);
        }
    }
}

/// Deletes everything that earlier removals gave up on. Returns how many paths are gone.
pub fn remove_deferred() -> usize {
    let pending = std::mem::take(&mut *DEFERRED.lock().unwrap_or_else(PoisonError::into_inner));
    let mut removed = 0;
    for path in pending {
        match try_remove(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("could not delete {} at exit: {}", path.display(), e),
        }
    }
    removed
}
