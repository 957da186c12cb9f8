//! Download entities: a file request and the byte-range parts it owns.
//!
//! Parts never point back at their file; the dispatcher keeps that association.

mod part;
mod snapshot;

pub use part::{FilePart, PartId};
pub use snapshot::{FileSnapshot, PartSnapshot};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::state::{reduce, FileState, PartState};
use crate::storage::AssemblyError;

/// One download request. Its status is always reduced from its parts.
#[derive(Debug)]
pub struct DownloadFile {
    locator: String,
    output_path: PathBuf,
    max_part_count: usize,
    parts: RwLock<Vec<Arc<FilePart>>>,
    unsaved_parts: AtomicUsize,
    saved: AtomicBool,
    cancelled: AtomicBool,
    failed: AtomicBool,
    error_text: Mutex<Option<String>>,
}

impl DownloadFile {
    pub fn new(locator: impl Into<String>, output_path: impl Into<PathBuf>, max_part_count: usize) -> Self {
        Self {
            locator: locator.into(),
            output_path: output_path.into(),
            max_part_count: max_part_count.max(1),
            parts: RwLock::new(Vec::new()),
            unsaved_parts: AtomicUsize::new(0),
            saved: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            error_text: Mutex::new(None),
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn max_part_count(&self) -> usize {
        self.max_part_count
    }

    /// Parts in creation order.
    pub fn parts(&self) -> Vec<Arc<FilePart>> {
        self.parts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn part_count(&self) -> usize {
        self.parts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Appends a part. A part added to an already cancelled file is cancelled
    /// on arrival so it never runs.
    pub(crate) fn add_part(&self, part: FilePart) -> Arc<FilePart> {
        let part = Arc::new(part);
        {
            let mut parts = self.parts.write().unwrap_or_else(PoisonError::into_inner);
            parts.push(Arc::clone(&part));
            self.unsaved_parts.fetch_add(1, Ordering::AcqRel);
        }
        if self.is_cancelled() {
            part.cancel();
        }
        part
    }

    /// Records one completed part; returns how many are still outstanding.
    pub(crate) fn part_completed(&self) -> usize {
        let previous = self
            .unsaved_parts
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn unsaved_part_count(&self) -> usize {
        self.unsaved_parts.load(Ordering::Acquire)
    }

    /// Terminal: the output file is complete. Refused while parts are outstanding.
    pub(crate) fn mark_saved(&self) -> Result<(), AssemblyError> {
        let outstanding = self.unsaved_part_count();
        if outstanding != 0 {
            return Err(AssemblyError::PartsOutstanding(outstanding));
        }
        self.saved.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_saved(&self) -> bool {
        self.saved.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sticky file-level failure (probe or assembly), independent of part states.
    pub(crate) fn mark_failed(&self, message: impl Into<String>) {
        self.failed.store(true, Ordering::Release);
        let mut text = self.error_text.lock().unwrap_or_else(PoisonError::into_inner);
        if text.is_none() {
            *text = Some(message.into());
        }
    }

    pub fn error_text(&self) -> Option<String> {
        self.error_text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> FileState {
        if self.is_saved() {
            return FileState::Done;
        }
        if self.is_cancelled() {
            return FileState::Cancelled;
        }
        let failed = self.failed.load(Ordering::Acquire);
        let parts = self.parts.read().unwrap_or_else(PoisonError::into_inner);
        if parts.is_empty() {
            return if failed {
                FileState::Failed
            } else {
                FileState::Initiated
            };
        }
        let folded = reduce(parts.iter().map(|p| p.status()));
        if failed {
            folded.join(FileState::Failed)
        } else {
            folded
        }
    }

    /// Average of part progress, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.is_saved() {
            return 1.0;
        }
        let parts = self.parts.read().unwrap_or_else(PoisonError::into_inner);
        if parts.is_empty() {
            return 0.0;
        }
        parts.iter().map(|p| p.progress()).sum::<f64>() / parts.len() as f64
    }

    /// Sum of part speeds in bytes per second.
    pub fn speed(&self) -> u64 {
        self.parts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| p.speed())
            .sum()
    }

    pub fn active_part_count(&self) -> usize {
        self.parts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| p.status() == PartState::Downloading)
            .count()
    }

    /// Requests a pause of every part; running parts confirm cooperatively.
    pub fn pause(&self) {
        for part in self.parts() {
            part.request_pause();
        }
    }

    /// Cancels the file and all its parts. A saved file cannot be cancelled.
    pub fn cancel(&self) -> bool {
        if self.is_saved() {
            return false;
        }
        self.cancelled.store(true, Ordering::Release);
        for part in self.parts() {
            part.cancel();
        }
        true
    }

    /// Every path this download may have written.
    pub(crate) fn written_paths(&self, include_output: bool) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .parts()
            .iter()
            .map(|p| p.temp_path().to_path_buf())
            .filter(|p| p.as_path() != self.output_path)
            .collect();
        if include_output {
            paths.push(self.output_path.clone());
        }
        paths
    }

    pub fn snapshot(&self) -> FileSnapshot {
        FileSnapshot::of(self)
    }
}
