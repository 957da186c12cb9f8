//! CLI for the HDM download manager.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hdm_core::config;
use std::path::PathBuf;

use commands::{run_checksum, run_get, run_probe, GetOptions};

/// Top-level CLI for the HDM download manager.
#[derive(Debug, Parser)]
#[command(name = "hdm")]
#[command(about = "HDM: segmented, resumable HTTP downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more URLs, each split into parts fetched in parallel.
    Get {
        /// Direct HTTP/HTTPS URLs.
        #[arg(required = true)]
        urls: Vec<String>,
        /// Output directory (default: current directory).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Maximum parts per file (default from config).
        #[arg(long, value_name = "N")]
        parts: Option<usize>,
        /// Worker budget shared by all downloads (default from config).
        #[arg(long, value_name = "M")]
        threads: Option<usize>,
        /// Expected SHA-256 of the downloaded file; only valid with a single URL.
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
        /// Print progress as JSON lines instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Probe a URL: status, size and range support.
    Probe {
        /// Direct HTTP/HTTPS URL.
        url: String,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                urls,
                dir,
                parts,
                threads,
                sha256,
                json,
            } => {
                let dir = match dir {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                let opts = GetOptions {
                    dir,
                    parts,
                    threads,
                    sha256,
                    json,
                };
                run_get(cfg, &urls, &opts)?;
            }
            CliCommand::Probe { url } => run_probe(&cfg, &url)?,
            CliCommand::Checksum { path } => run_checksum(&path)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
