//! libcurl-backed communication component.
//!
//! Probes run on the calling thread. A ranged fetch runs its transfer on a
//! dedicated thread and hands body chunks to the caller through a bounded
//! channel, so the chunk worker reads a plain blocking stream.

use std::io;
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::thread;
use std::time::Duration;

use curl::easy::{Easy2, Handler, WriteError};
use url::Url;

use super::body::{ChannelBody, TransferEvent};
use super::parse::parse_response_head;
use super::{CheckResult, CommError, Communication, CommunicationStatus, DownloadResponse};
use crate::config::HttpConfig;
use crate::url_model::parse_locator;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Collects header lines of the final response; nothing else.
#[derive(Default)]
struct HeadCollector {
    headers: Vec<String>,
}

impl Handler for HeadCollector {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            self.headers.push(s.trim_end().to_string());
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        Ok(data.len())
    }
}

/// Forwards the response head, then body chunks, to the reading side.
struct StreamHandler {
    tx: SyncSender<TransferEvent>,
    headers: Vec<String>,
    head_sent: bool,
}

impl StreamHandler {
    fn new(tx: SyncSender<TransferEvent>) -> Self {
        Self {
            tx,
            headers: Vec::new(),
            head_sent: false,
        }
    }

    /// Returns false once the reader has hung up.
    fn send_head(&mut self) -> bool {
        if self.head_sent {
            return true;
        }
        self.head_sent = true;
        let (code, content_length) = parse_response_head(&self.headers);
        self.tx
            .send(TransferEvent::Head {
                code: code.unwrap_or(0),
                content_length,
            })
            .is_ok()
    }
}

impl Handler for StreamHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                self.headers.clear();
            }
            self.headers.push(line.to_string());
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if !self.send_head() {
            return Ok(0);
        }
        match self.tx.send(TransferEvent::Data(data.to_vec())) {
            Ok(()) => Ok(data.len()),
            // Reader dropped the body: a short write makes curl abort.
            Err(_) => Ok(0),
        }
    }
}

pub(super) fn classify_probe(code: u32, size: Option<u64>) -> CommunicationStatus {
    match code {
        206 if size.unwrap_or(0) > 0 => CommunicationStatus::PartialContentOk,
        200..=299 => CommunicationStatus::Ok,
        _ => CommunicationStatus::Error,
    }
}

pub(super) fn classify_download(code: u32, start: u64, length: Option<u64>) -> CommunicationStatus {
    match code {
        206 => CommunicationStatus::PartialContentOk,
        200..=299 if start == 0 && length.is_none() => CommunicationStatus::Ok,
        200..=299 => CommunicationStatus::PartialContentNok,
        _ => CommunicationStatus::Error,
    }
}

fn range_header(start: u64, length: Option<u64>) -> String {
    match length {
        Some(len) if len > 0 => format!("{}-{}", start, start + len - 1),
        _ => format!("{start}-"),
    }
}

/// HTTP(S) transport over libcurl easy handles.
pub struct CurlCommunication {
    config: HttpConfig,
    closed: AtomicBool,
}

impl CurlCommunication {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), CommError> {
        if self.closed.load(Ordering::Acquire) {
            Err(CommError::Closed)
        } else {
            Ok(())
        }
    }

    fn easy<H: Handler>(&self, url: &Url, handler: H) -> Result<Easy2<H>, curl::Error> {
        let mut easy = Easy2::new(handler);
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.config.connect_timeout())?;
        easy.low_speed_limit(self.config.low_speed_limit)?;
        easy.low_speed_time(self.config.low_speed_time())?;
        Ok(easy)
    }

    fn probe(&self, url: &Url) -> Result<CheckResult, curl::Error> {
        let mut easy = self.easy(url, HeadCollector::default())?;
        easy.nobody(true)?;
        easy.range("0-")?;
        easy.timeout(PROBE_TIMEOUT)?;
        easy.perform()?;
        let code = easy.response_code()?;
        let (_, size) = parse_response_head(&easy.get_ref().headers);
        Ok(CheckResult {
            status: classify_probe(code, size),
            message: format!("HTTP {code}"),
            size,
        })
    }
}

fn unavailable(message: impl Into<String>) -> DownloadResponse {
    DownloadResponse {
        status: CommunicationStatus::Unavailable,
        message: message.into(),
        size: None,
        body: Box::new(io::empty()),
    }
}

fn run_transfer(mut easy: Easy2<StreamHandler>) {
    let result = easy.perform();
    let handler = easy.get_mut();
    match result {
        Ok(()) => {
            handler.send_head();
        }
        Err(e) if e.is_write_error() => {
            tracing::debug!("transfer aborted by reader");
        }
        Err(e) => {
            let _ = handler.tx.send(TransferEvent::Failed(e.to_string()));
        }
    }
}

impl Communication for CurlCommunication {
    fn check_remote_file(&self, locator: &str) -> Result<CheckResult, CommError> {
        self.ensure_open()?;
        let url = parse_locator(locator).ok_or_else(|| CommError::BadLocator(locator.to_string()))?;
        Ok(self.probe(&url).unwrap_or_else(|e| {
            tracing::warn!(%url, "probe failed: {}", e);
            CheckResult {
                status: CommunicationStatus::Unavailable,
                message: e.to_string(),
                size: None,
            }
        }))
    }

    fn download_remote_file(
        &self,
        locator: &str,
        start: u64,
        length: Option<u64>,
    ) -> Result<DownloadResponse, CommError> {
        self.ensure_open()?;
        let url = parse_locator(locator).ok_or_else(|| CommError::BadLocator(locator.to_string()))?;
        let (tx, rx) = sync_channel(self.config.stream_buffer_chunks.max(1));
        let easy = self
            .easy(&url, StreamHandler::new(tx))
            .and_then(|mut easy| {
                easy.range(&range_header(start, length))?;
                Ok(easy)
            });
        let easy = match easy {
            Ok(easy) => easy,
            Err(e) => return Ok(unavailable(e.to_string())),
        };
        if let Err(e) = thread::Builder::new()
            .name("hdm-transfer".into())
            .spawn(move || run_transfer(easy))
        {
            return Ok(unavailable(format!("spawn transfer thread: {e}")));
        }

        match rx.recv() {
            Ok(TransferEvent::Head {
                code,
                content_length,
            }) => Ok(DownloadResponse {
                status: classify_download(code, start, length),
                message: format!("HTTP {code}"),
                size: content_length,
                body: Box::new(ChannelBody::new(rx)),
            }),
            Ok(TransferEvent::Failed(message)) => Ok(unavailable(message)),
            Ok(TransferEvent::Data(_)) | Err(_) => {
                Ok(unavailable("transfer ended without a response"))
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
