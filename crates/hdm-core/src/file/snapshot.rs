use serde::Serialize;
use std::path::PathBuf;

use super::{DownloadFile, FilePart};
use crate::state::{FileState, PartState};

/// Point-in-time view of a download, for front ends.
#[derive(Debug, Clone, Serialize)]
pub struct FileSnapshot {
    pub locator: String,
    pub output_path: PathBuf,
    pub status: FileState,
    pub progress: f64,
    pub speed: u64,
    pub active_parts: usize,
    pub error: Option<String>,
    pub parts: Vec<PartSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartSnapshot {
    pub index: usize,
    pub start: u64,
    pub length: Option<u64>,
    pub downloaded: u64,
    pub status: PartState,
    pub speed: u64,
    pub partial_download_supported: bool,
    pub error: Option<String>,
}

impl PartSnapshot {
    fn of(part: &FilePart) -> Self {
        Self {
            index: part.index(),
            start: part.start(),
            length: part.length(),
            downloaded: part.downloaded(),
            status: part.status(),
            speed: part.speed(),
            partial_download_supported: part.partial_download_supported(),
            error: part.error_text(),
        }
    }
}

impl FileSnapshot {
    pub(super) fn of(file: &DownloadFile) -> Self {
        Self {
            locator: file.locator().to_string(),
            output_path: file.output_path().to_path_buf(),
            status: file.status(),
            progress: file.progress(),
            speed: file.speed(),
            active_parts: file.active_part_count(),
            error: file.error_text(),
            parts: file.parts().iter().map(|p| PartSnapshot::of(p)).collect(),
        }
    }

    /// Bytes downloaded across all parts.
    pub fn downloaded(&self) -> u64 {
        self.parts.iter().map(|p| p.downloaded).sum()
    }
}
