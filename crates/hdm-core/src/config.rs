use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Transport tuning for the curl communication component (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Abort a transfer when throughput stays below this many bytes/s...
    pub low_speed_limit: u32,
    /// ...for this many seconds.
    pub low_speed_time_secs: u64,
    /// Body chunks buffered between the transfer thread and the reading worker.
    pub stream_buffer_chunks: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 6,
            low_speed_limit: 1024,
            low_speed_time_secs: 30,
            stream_buffer_chunks: 16,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn low_speed_time(&self) -> Duration {
        Duration::from_secs(self.low_speed_time_secs)
    }
}

/// Bounded retry window for deleting temp/output files of forgotten downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalConfig {
    pub timeout_secs: u64,
    pub retry_interval_ms: u64,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            retry_interval_ms: 100,
        }
    }
}

impl RemovalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Global configuration loaded from `~/.config/hdm/config.toml`.
///
/// Passed by value into the dispatcher; nothing reads it from a global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HdmConfig {
    /// Initial worker budget (number of concurrently running tasks).
    pub max_threads: usize,
    /// Parts per file when the caller does not ask for a specific count.
    pub default_part_count: usize,
    /// Read buffer of the chunk worker, in bytes.
    pub buffer_size: usize,
    /// Window over which download speed is measured.
    pub speed_sample_interval_ms: u64,
    /// Idle workers above zero retire after this long without work.
    pub worker_keep_alive_secs: u64,
    /// How long `close()` waits for running workers before deleting files.
    pub shutdown_grace_ms: u64,
    #[serde(default)]
    pub http: Option<HttpConfig>,
    #[serde(default)]
    pub removal: Option<RemovalConfig>,
}

impl Default for HdmConfig {
    fn default() -> Self {
        Self {
            max_threads: 4,
            default_part_count: 4,
            buffer_size: 4096,
            speed_sample_interval_ms: 1000,
            worker_keep_alive_secs: 60,
            shutdown_grace_ms: 1000,
            http: None,
            removal: None,
        }
    }
}

impl HdmConfig {
    pub fn http(&self) -> HttpConfig {
        self.http.clone().unwrap_or_default()
    }

    pub fn removal(&self) -> RemovalConfig {
        self.removal.clone().unwrap_or_default()
    }

    pub fn speed_sample_interval(&self) -> Duration {
        Duration::from_millis(self.speed_sample_interval_ms)
    }

    pub fn worker_keep_alive(&self) -> Duration {
        Duration::from_secs(self.worker_keep_alive_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HdmConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = HdmConfig::default();
        assert_eq!(cfg.max_threads, 4);
        assert_eq!(cfg.buffer_size, 4096);
        assert_eq!(cfg.speed_sample_interval(), Duration::from_secs(1));
        assert_eq!(cfg.removal().timeout(), Duration::from_secs(10));
        assert_eq!(cfg.removal().retry_interval(), Duration::from_millis(100));
    }

    #[test]
    fn config_toml_roundtrip_keeps_sections() {
        let mut cfg = HdmConfig::default();
        cfg.http = Some(HttpConfig {
            connect_timeout_secs: 3,
            ..HttpConfig::default()
        });
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: HdmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_threads, cfg.max_threads);
        assert_eq!(parsed.http().connect_timeout_secs, 3);
        assert!(parsed.removal.is_none());
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_threads = 20
            default_part_count = 3
            buffer_size = 512
            speed_sample_interval_ms = 250
            worker_keep_alive_secs = 5
            shutdown_grace_ms = 100

            [removal]
            timeout_secs = 1
            retry_interval_ms = 10
        "#;
        let cfg: HdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_threads, 20);
        assert_eq!(cfg.default_part_count, 3);
        assert_eq!(cfg.buffer_size, 512);
        assert_eq!(cfg.shutdown_grace(), Duration::from_millis(100));
        assert_eq!(cfg.removal().timeout(), Duration::from_secs(1));
        assert!(cfg.http.is_none());
        assert_eq!(cfg.http().stream_buffer_chunks, 16);
    }
}
