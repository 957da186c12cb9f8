//! `hdm probe` – ask the server about a URL without downloading it.

use anyhow::{bail, Result};
use hdm_core::comms::CommunicationStatus;
use hdm_core::config::HdmConfig;
use hdm_core::{Communication, CurlCommunication};

pub fn run_probe(cfg: &HdmConfig, url: &str) -> Result<()> {
    let comm = CurlCommunication::new(cfg.http());
    let result = comm.check_remote_file(url)?;
    let size = result
        .size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let ranges = result.status == CommunicationStatus::PartialContentOk;
    println!("status:  {} ({})", result.status, result.message);
    println!("size:    {}", size);
    println!("ranges:  {}", if ranges { "yes" } else { "no" });
    if !matches!(result.status, CommunicationStatus::Ok | CommunicationStatus::PartialContentOk) {
        bail!("{} is not downloadable: {}", url, result.message);
    }
    Ok(())
}
