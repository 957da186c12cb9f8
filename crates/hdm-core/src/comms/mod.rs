//! Communication component: the only code that talks to the remote side.
//!
//! The planning task and the chunk workers see it through [`Communication`];
//! transport failures come back as a [`CommunicationStatus`], not as errors.

mod body;
mod http;
mod parse;

#[cfg(test)]
pub(crate) mod mock;

pub use http::CurlCommunication;

use std::fmt;
use std::io::Read;
use thiserror::Error;

/// Outcome class of a probe or a ranged fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationStatus {
    /// Full content served.
    Ok,
    /// The requested range was served.
    PartialContentOk,
    /// A range was requested but the server sent something else.
    PartialContentNok,
    /// Transport failure; nothing usable came back.
    Unavailable,
    /// The server answered with a non-success status.
    Error,
}

impl fmt::Display for CommunicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommunicationStatus::Ok => "ok",
            CommunicationStatus::PartialContentOk => "partial content ok",
            CommunicationStatus::PartialContentNok => "partial content not supported",
            CommunicationStatus::Unavailable => "unavailable",
            CommunicationStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub status: CommunicationStatus,
    /// Diagnostic text (status line or transport error).
    pub message: String,
    /// Resource size when the server reported one.
    pub size: Option<u64>,
}

/// Response to a ranged fetch. Dropping it releases the stream.
pub struct DownloadResponse {
    pub status: CommunicationStatus,
    pub message: String,
    /// Size of the served body when reported.
    pub size: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("status", &self.status)
            .field("message", &self.message)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum CommError {
    #[error("malformed locator: {0}")]
    BadLocator(String),
    #[error("communication component is closed")]
    Closed,
}

pub trait Communication: Send + Sync {
    /// Probes `locator` for size and range support.
    fn check_remote_file(&self, locator: &str) -> Result<CheckResult, CommError>;

    /// Fetches `length` bytes from `start`; `None` means until the end.
    fn download_remote_file(
        &self,
        locator: &str,
        start: u64,
        length: Option<u64>,
    ) -> Result<DownloadResponse, CommError>;

    /// Refuses further requests. In-flight streams finish or fail on their own.
    fn close(&self);
}
