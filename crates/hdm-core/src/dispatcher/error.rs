use std::path::PathBuf;
use thiserror::Error;

use crate::file::PartId;

/// Synchronous rejection of `submit_file`.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("malformed locator or no file name in it: {0}")]
    BadLocator(String),
    #[error("output path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("already downloading {0}")]
    DuplicateLocator(String),
    #[error("another download already writes {}", .0.display())]
    DuplicateOutputPath(PathBuf),
    #[error("dispatcher is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("part {0:?} already has a task in flight")]
    PartAlreadyTracked(PartId),
    #[error("file is no longer known to the dispatcher: {0}")]
    UnknownFile(String),
}
