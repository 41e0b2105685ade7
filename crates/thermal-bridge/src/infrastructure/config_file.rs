//! Optional TOML configuration file.
//!
//! Every key is optional; a missing key keeps whatever value the config
//! already had.  Durations are whole seconds.
//!
//! ```toml
//! ws_bind = "127.0.0.1:8085"
//! from_device = "/run/thermal/fromC"
//! to_device = "/run/thermal/toC"
//! queue_capacity = 64
//! codec = "bincode"
//! read_idle_timeout = 300
//! write_timeout = 5
//! receive_retry_limit = 3
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::config::{BridgeConfig, CodecKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// The file's contents, before merging.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub ws_bind: Option<SocketAddr>,
    pub from_device: Option<PathBuf>,
    pub to_device: Option<PathBuf>,
    pub queue_capacity: Option<usize>,
    pub codec: Option<CodecKind>,
    pub read_idle_timeout: Option<u64>,
    pub write_timeout: Option<u64>,
    pub receive_retry_limit: Option<u32>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Overwrites every field of `config` that the file sets.
    pub fn apply_to(self, config: &mut BridgeConfig) -> Result<(), ConfigError> {
        if let Some(addr) = self.ws_bind {
            config.ws_bind_addr = addr;
        }
        if let Some(path) = self.from_device {
            config.from_device_path = path;
        }
        if let Some(path) = self.to_device {
            config.to_device_path = path;
        }
        if let Some(capacity) = self.queue_capacity {
            if capacity == 0 {
                return Err(ConfigError::ZeroQueueCapacity);
            }
            config.session_queue_capacity = capacity;
        }
        if let Some(codec) = self.codec {
            config.codec = codec;
        }
        if let Some(secs) = self.read_idle_timeout {
            config.session_policy.read_idle_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = self.write_timeout {
            config.session_policy.write_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(limit) = self.receive_retry_limit {
            config.receive_retry_limit = limit;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
