//! Chunk worker: downloads one part and honours pause, suspend and cancel
//! requests between buffered reads, so the temp file always holds exactly
//! the counted bytes when the worker stops.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use super::speed::SpeedSampler;
use crate::comms::{CommError, CommunicationStatus};
use crate::dispatcher::DispatchCore;
use crate::file::FilePart;
use crate::state::PartState;
use crate::storage::{assemble, PartWriter};

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("transfer failed: {0}")]
    Transport(io::Error),
    #[error("unacceptable response ({status}): {message}")]
    UnacceptableResponse {
        status: CommunicationStatus,
        message: String,
    },
    #[error("writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stream ended {missing} byte(s) short")]
    Truncated { missing: u64 },
    #[error("part left the downloading state unexpectedly: {0}")]
    UnexpectedState(PartState),
}

/// Why the read loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkOutcome {
    Completed,
    Paused,
    Evicted,
    Cancelled,
}

pub(crate) fn run_chunk(core: &DispatchCore, part: &Arc<FilePart>) {
    if let Err(status) = core.begin_chunk(part) {
        tracing::debug!(part = part.index(), %status, "part not startable; task dropped");
        return;
    }
    tracing::debug!(part = part.index(), downloaded = part.downloaded(), "chunk started");
    let outcome = download(core, part);
    part.set_speed(0);

    match outcome {
        Ok(ChunkOutcome::Completed) => complete(core, part),
        Ok(ChunkOutcome::Paused) => {
            if let Err(e) = core.finish_chunk(part, || part.confirm_pause()) {
                tracing::warn!(part = part.index(), "pause confirmation lost: {}", e);
            } else {
                tracing::info!(part = part.index(), downloaded = part.downloaded(), "part paused");
            }
        }
        Ok(ChunkOutcome::Evicted) => {
            tracing::info!(part = part.index(), downloaded = part.downloaded(), "part evicted; requeueing");
            if let Err(e) = core.resubmit_evicted(part) {
                tracing::warn!(part = part.index(), "evicted part dropped: {}", e);
            }
        }
        Ok(ChunkOutcome::Cancelled) => {
            core.finish_chunk(part, || ());
            tracing::debug!(part = part.index(), "part cancelled");
        }
        Err(e) => {
            let transition = core.finish_chunk(part, || part.fail(e.to_string()));
            tracing::warn!(part = part.index(), now = %transition.to, "chunk failed: {}", e);
        }
    }
}

fn complete(core: &DispatchCore, part: &Arc<FilePart>) {
    let transition = match core.finish_chunk(part, || part.complete()) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(part = part.index(), "cannot complete part: {}", e);
            return;
        }
    };
    if !transition.changed() || transition.to != PartState::Done {
        tracing::debug!(part = part.index(), now = %transition.to, "completion superseded");
        return;
    }
    let Some(file) = core.owner_of(part) else {
        tracing::warn!(part = part.index(), "completed part of a forgotten file");
        return;
    };
    let outstanding = file.part_completed();
    tracing::debug!(part = part.index(), outstanding, "part done");
    if outstanding > 0 {
        return;
    }
    match assemble(&file) {
        Ok(()) => tracing::info!(output = %file.output_path().display(), "download complete"),
        Err(e) => {
            tracing::error!(output = %file.output_path().display(), "assembly failed: {}", e);
            file.mark_failed(e.to_string());
        }
    }
}

fn download(core: &DispatchCore, part: &FilePart) -> Result<ChunkOutcome, ChunkError> {
    let resumable = part.partial_download_supported();
    if !resumable {
        part.reset_downloaded();
    }
    let downloaded = part.downloaded();
    if part.remaining() == Some(0) {
        return Ok(ChunkOutcome::Completed);
    }
    // Without range support every attempt refetches the whole resource.
    let (start, requested) = if resumable {
        (part.start() + downloaded, part.remaining())
    } else {
        (part.start(), None)
    };
    let response = core
        .comm()
        .download_remote_file(part.locator(), start, requested)?;

    if part.length().is_none() {
        if let Some(size) = response.size {
            if !part.set_length(downloaded + size) {
                tracing::warn!(part = part.index(), "length was set concurrently");
            }
        }
    }

    let whole_resource = start == 0 && requested.is_none();
    match response.status {
        CommunicationStatus::PartialContentOk => {}
        CommunicationStatus::Ok if whole_resource || !resumable => {}
        status => {
            return Err(ChunkError::UnacceptableResponse {
                status,
                message: response.message,
            })
        }
    }

    let path = part.temp_path();
    let io_err = |source| ChunkError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = PartWriter::open(path, downloaded).map_err(io_err)?;
    let mut body = response.body;
    let mut buf = vec![0u8; core.config().buffer_size.max(1)];
    let mut sampler = SpeedSampler::new(core.config().speed_sample_interval());

    loop {
        let want = match part.remaining() {
            Some(0) => break,
            Some(left) => buf.len().min(usize::try_from(left).unwrap_or(usize::MAX)),
            None => buf.len(),
        };
        let n = match body.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) if part.status() == PartState::Cancelled => return Ok(ChunkOutcome::Cancelled),
            Err(e) => return Err(ChunkError::Transport(e)),
        };
        writer.append(&buf[..n]).map_err(io_err)?;
        part.add_downloaded(n as u64);
        if let Some(rate) = sampler.record(n) {
            part.set_speed(rate);
        }

        match part.status() {
            PartState::Downloading => {}
            PartState::Cancelled => return Ok(ChunkOutcome::Cancelled),
            PartState::PauseRequested => return Ok(ChunkOutcome::Paused),
            PartState::SuspendRequested => return Ok(ChunkOutcome::Evicted),
            other => return Err(ChunkError::UnexpectedState(other)),
        }
    }

    match part.remaining() {
        None | Some(0) => Ok(ChunkOutcome::Completed),
        Some(missing) => Err(ChunkError::Truncated { missing }),
    }
}
