//! Planning task: probe the resource, partition it, create and queue parts.

use std::fs;
use std::io;
use std::sync::Arc;

use super::plan::plan_parts;
use crate::comms::CommunicationStatus;
use crate::dispatcher::DispatchCore;
use crate::file::{DownloadFile, FilePart};
use crate::storage::part_temp_path;

pub(crate) fn run_check(core: &DispatchCore, file: &Arc<DownloadFile>) {
    if file.is_cancelled() {
        tracing::debug!(locator = file.locator(), "skipping probe of cancelled file");
        return;
    }
    let probe = match core.comm().check_remote_file(file.locator()) {
        Ok(probe) => probe,
        Err(e) => {
            tracing::warn!(locator = file.locator(), "probe failed: {}", e);
            file.mark_failed(e.to_string());
            return;
        }
    };
    let partial = match probe.status {
        CommunicationStatus::PartialContentOk => true,
        CommunicationStatus::Ok => false,
        status => {
            tracing::warn!(locator = file.locator(), %status, message = %probe.message, "probe rejected");
            file.mark_failed(format!("probe {status}: {}", probe.message));
            return;
        }
    };

    let plan = plan_parts(probe.size, file.max_part_count(), partial);
    let output = file.output_path();
    let mut parts = Vec::with_capacity(plan.len());
    for (index, planned) in plan.iter().enumerate() {
        let temp = if plan.len() == 1 {
            output.to_path_buf()
        } else {
            part_temp_path(output, index)
        };
        if let Err(e) = remove_stale(&temp) {
            tracing::warn!("cannot clear {}: {}", temp.display(), e);
            file.mark_failed(format!("cannot clear {}: {e}", temp.display()));
            return;
        }
        parts.push(FilePart::new(
            index,
            file.locator(),
            temp,
            planned.start,
            planned.length,
            planned.partial_download_supported,
        ));
    }

    match core.add_parts(file, parts) {
        Ok(parts) => tracing::info!(
            locator = file.locator(),
            parts = parts.len(),
            size = ?probe.size,
            partial,
            "download planned"
        ),
        Err(e) => tracing::warn!(locator = file.locator(), "plan dropped: {}", e),
    }
}

fn remove_stale(path: &std::path::Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
