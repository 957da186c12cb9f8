//! Blocking `Read` over body chunks produced by a transfer thread.

use std::io::{self, Read};
use std::sync::mpsc::Receiver;

pub(super) enum TransferEvent {
    /// Final response head, sent before any data.
    Head {
        code: u32,
        content_length: Option<u64>,
    },
    Data(Vec<u8>),
    /// Transport error; terminal.
    Failed(String),
}

/// Body stream of a ranged fetch. The transfer thread ends the stream by
/// hanging up; dropping the body makes its next send fail and aborts the transfer.
pub(super) struct ChannelBody {
    rx: Receiver<TransferEvent>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ChannelBody {
    pub(super) fn new(rx: Receiver<TransferEvent>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for ChannelBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.chunk.len() {
            match self.rx.recv() {
                Ok(TransferEvent::Data(data)) => {
                    self.chunk = data;
                    self.pos = 0;
                }
                Ok(TransferEvent::Failed(message)) => {
                    return Err(io::Error::new(io::ErrorKind::Other, message))
                }
                Ok(TransferEvent::Head { .. }) => continue,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn reads_across_chunks_then_eof_on_hangup() {
        let (tx, rx) = sync_channel(4);
        tx.send(TransferEvent::Data(b"abc".to_vec())).unwrap();
        tx.send(TransferEvent::Data(b"defg".to_vec())).unwrap();
        drop(tx);
        let mut body = ChannelBody::new(rx);
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcdefg");
    }

    #[test]
    fn transport_failure_surfaces_as_read_error() {
        let (tx, rx) = sync_channel(4);
        tx.send(TransferEvent::Data(b"ab".to_vec())).unwrap();
        tx.send(TransferEvent::Failed("connection reset".into())).unwrap();
        let mut body = ChannelBody::new(rx);
        let mut buf = [0u8; 8];
        assert_eq!(body.read(&mut buf).unwrap(), 2);
        let err = body.read(&mut buf).unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
