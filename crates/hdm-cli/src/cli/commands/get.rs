//! `hdm get` – download URLs and report progress until every file settles.

use anyhow::{bail, Context, Result};
use hdm_core::checksum;
use hdm_core::config::HdmConfig;
use hdm_core::dispatcher::remove_deferred;
use hdm_core::{CurlCommunication, Dispatcher, DownloadFile, FileState};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const REPORT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct GetOptions {
    pub dir: PathBuf,
    pub parts: Option<usize>,
    pub threads: Option<usize>,
    pub sha256: Option<String>,
    pub json: bool,
}

pub fn run_get(mut cfg: HdmConfig, urls: &[String], opts: &GetOptions) -> Result<()> {
    if opts.sha256.is_some() && urls.len() != 1 {
        bail!("--sha256 needs exactly one URL");
    }
    if let Some(threads) = opts.threads {
        cfg.max_threads = threads.max(1);
    }
    let parts = opts.parts.unwrap_or(cfg.default_part_count).max(1);
    let comm = Arc::new(CurlCommunication::new(cfg.http()));
    let dispatcher = Dispatcher::new(cfg, comm);

    let mut files = Vec::with_capacity(urls.len());
    for url in urls {
        let file = dispatcher
            .submit_file(url, &opts.dir, parts)
            .with_context(|| format!("cannot queue {}", url))?;
        files.push(file);
    }

    loop {
        report(&files, opts.json)?;
        if files.iter().all(|f| f.status().is_finished()) {
            break;
        }
        thread::sleep(REPORT_INTERVAL);
    }

    let verified = match &opts.sha256 {
        Some(expected) => verify(&files[0], expected),
        None => Ok(()),
    };
    dispatcher.close();
    let cleaned = remove_deferred();
    if cleaned > 0 {
        tracing::debug!(cleaned, "deferred deletions completed");
    }
    verified?;

    let failed: Vec<_> = files
        .iter()
        .filter(|f| f.status() != FileState::Done)
        .collect();
    if !failed.is_empty() {
        for f in &failed {
            eprintln!(
                "{}: {}",
                f.locator(),
                f.error_text().unwrap_or_else(|| f.status().to_string())
            );
        }
        bail!("{} of {} download(s) did not complete", failed.len(), files.len());
    }
    Ok(())
}

fn report(files: &[Arc<DownloadFile>], json: bool) -> Result<()> {
    for file in files {
        if json {
            println!("{}", serde_json::to_string(&file.snapshot())?);
        } else {
            println!(
                "{:<11} {:>6.1}% {:>10}/s  {} part(s) active  {}",
                file.status().to_string(),
                file.progress() * 100.0,
                file.speed(),
                file.active_part_count(),
                file.output_path().display()
            );
        }
    }
    Ok(())
}

fn verify(file: &DownloadFile, expected: &str) -> Result<()> {
    if file.status() != FileState::Done {
        return Ok(());
    }
    let path = file.output_path();
    if !checksum::verify_sha256(path, expected)? {
        bail!("SHA-256 mismatch for {}", path.display());
    }
    println!("sha256 OK  {}", path.display());
    Ok(())
}
