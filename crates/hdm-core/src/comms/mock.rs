//! In-memory communication component for dispatcher tests.
//!
//! Serves a resource whose byte at offset `o` is `fill_byte(o)`, slowly enough
//! that tests can observe and steer running parts.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{CheckResult, CommError, Communication, CommunicationStatus, DownloadResponse};

pub(crate) fn fill_byte(offset: u64) -> u8 {
    (offset % 251) as u8
}

pub(crate) fn expected_content(size: u64) -> Vec<u8> {
    (0..size).map(fill_byte).collect()
}

#[derive(Debug, Default)]
struct Counters {
    open_streams: AtomicUsize,
    max_open_streams: AtomicUsize,
}

pub(crate) struct MockCommunication {
    size: u64,
    ranges: bool,
    probe_status: Mutex<CommunicationStatus>,
    read_delay: Duration,
    read_chunk: usize,
    /// Next stream that reaches this absolute offset fails once.
    fail_at: Mutex<Option<u64>>,
    counters: Arc<Counters>,
    download_requests: AtomicUsize,
    closed: AtomicBool,
}

impl MockCommunication {
    pub(crate) fn new(size: u64) -> Self {
        Self {
            size,
            ranges: true,
            probe_status: Mutex::new(CommunicationStatus::PartialContentOk),
            read_delay: Duration::from_millis(1),
            read_chunk: 50,
            fail_at: Mutex::new(None),
            counters: Arc::new(Counters::default()),
            download_requests: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// A server that ignores ranges and always sends the whole body.
    pub(crate) fn without_ranges(mut self) -> Self {
        self.ranges = false;
        *self.probe_status.get_mut().unwrap() = CommunicationStatus::Ok;
        self
    }

    pub(crate) fn with_pace(mut self, read_chunk: usize, read_delay: Duration) -> Self {
        self.read_chunk = read_chunk;
        self.read_delay = read_delay;
        self
    }

    pub(crate) fn set_probe_status(&self, status: CommunicationStatus) {
        *self.probe_status.lock().unwrap() = status;
    }

    pub(crate) fn fail_once_at(&self, offset: u64) {
        *self.fail_at.lock().unwrap() = Some(offset);
    }

    pub(crate) fn download_requests(&self) -> usize {
        self.download_requests.load(Ordering::SeqCst)
    }

    pub(crate) fn max_open_streams(&self) -> usize {
        self.counters.max_open_streams.load(Ordering::SeqCst)
    }

    pub(crate) fn open_streams(&self) -> usize {
        self.counters.open_streams.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn take_failure_in(&self, start: u64, end: u64) -> Option<u64> {
        let mut fail_at = self.fail_at.lock().unwrap();
        match *fail_at {
            Some(at) if at >= start && at < end => fail_at.take(),
            _ => None,
        }
    }
}

struct MockStream {
    pos: u64,
    end: u64,
    fail_at: Option<u64>,
    read_chunk: usize,
    read_delay: Duration,
    counters: Arc<Counters>,
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        thread::sleep(self.read_delay);
        if self.fail_at == Some(self.pos) {
            self.fail_at = None;
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "mock connection reset"));
        }
        let mut limit = self.end;
        if let Some(at) = self.fail_at {
            limit = limit.min(at);
        }
        let n = (limit - self.pos).min(buf.len() as u64).min(self.read_chunk as u64) as usize;
        for (i, b) in buf[..n].iter_mut().enumerate() {
            *b = fill_byte(self.pos + i as u64);
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.counters.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Communication for MockCommunication {
    fn check_remote_file(&self, _locator: &str) -> Result<CheckResult, CommError> {
        if self.is_closed() {
            return Err(CommError::Closed);
        }
        let status = *self.probe_status.lock().unwrap();
        Ok(CheckResult {
            status,
            message: format!("mock {status}"),
            size: Some(self.size),
        })
    }

    fn download_remote_file(
        &self,
        _locator: &str,
        start: u64,
        length: Option<u64>,
    ) -> Result<DownloadResponse, CommError> {
        if self.is_closed() {
            return Err(CommError::Closed);
        }
        self.download_requests.fetch_add(1, Ordering::SeqCst);
        let whole = start == 0 && length.is_none();
        let (status, start, end) = if self.ranges {
            let end = length.map_or(self.size, |len| (start + len).min(self.size));
            (CommunicationStatus::PartialContentOk, start, end)
        } else if whole {
            (CommunicationStatus::Ok, 0, self.size)
        } else {
            (CommunicationStatus::PartialContentNok, 0, self.size)
        };
        let open = self.counters.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open_streams.fetch_max(open, Ordering::SeqCst);
        Ok(DownloadResponse {
            status,
            message: format!("mock {status}"),
            size: Some(end - start),
            body: Box::new(MockStream {
                pos: start,
                end,
                fail_at: self.take_failure_in(start, end),
                read_chunk: self.read_chunk,
                read_delay: self.read_delay,
                counters: Arc::clone(&self.counters),
            }),
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
