//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one static body under any path. A request carrying `Range: bytes=a-b`
//! gets `206 Partial Content` (HEAD included, which is how the probe asks),
//! unless ranges are switched off, in which case everything is a plain 200.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, Range headers are ignored and the whole body is sent with 200.
    pub support_ranges: bool,
    /// If set, every GET answers with this status and no body.
    pub fail_status: Option<u16>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            fail_status: None,
        }
    }
}

pub struct RangeServer {
    pub url: String,
    gets: Arc<AtomicUsize>,
}

impl RangeServer {
    /// Number of GET requests served so far.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

/// Starts a server serving `body` as `/<name>`. It runs until the process exits.
pub fn start(body: Vec<u8>, name: &str) -> RangeServer {
    start_with_options(body, name, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, name: &str, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let gets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&gets);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &body, opts, &counter));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/{}", port, name),
        gets,
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions, gets: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, range) = parse_request(request);
    let head_only = method.eq_ignore_ascii_case("HEAD");
    if !head_only && !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }
    if !head_only {
        gets.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = opts.fail_status {
            let response = format!("HTTP/1.1 {} Failure\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", code);
            let _ = stream.write_all(response.as_bytes());
            return;
        }
    }

    let total = body.len() as u64;
    let (status, extra, slice) = match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl {
                ("416 Range Not Satisfiable", format!("Content-Range: bytes */{}\r\n", total), &body[0..0])
            } else {
                let slice = &body[start as usize..=end_incl as usize];
                (
                    "206 Partial Content",
                    format!("Content-Range: bytes {}-{}/{}\r\nAccept-Ranges: bytes\r\n", start, end_incl, total),
                    slice,
                )
            }
        }
        None => ("200 OK", String::new(), body),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        status,
        slice.len(),
        extra
    );
    let _ = stream.write_all(response.as_bytes());
    if !head_only {
        let _ = stream.write_all(slice);
    }
}

/// Returns (method, optional (start, end_inclusive) for `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        if let Some(ranges) = value.trim().strip_prefix("bytes=") {
            if let Some((a, b)) = ranges.split_once('-') {
                let start = a.trim().parse::<u64>().unwrap_or(0);
                let end = b.trim();
                let end_incl = if end.is_empty() { u64::MAX } else { end.parse().unwrap_or(0) };
                range = Some((start, end_incl));
            }
        }
    }
    (method, range)
}
