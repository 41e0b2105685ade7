//! Thermal camera WebSocket bridge: entry point.
//!
//! This binary connects the camera control process (two named pipes carrying
//! fixed 68-byte frames) to any number of WebSocket clients.  Every device
//! state change is broadcast to all clients; every client command is written
//! to the device.
//!
//! # Usage
//!
//! ```text
//! thermal-bridge [OPTIONS]
//!
//! Options:
//!   --config <FILE>               Optional TOML config file
//!   --ws-bind <ADDR>              WebSocket listen address [default: 0.0.0.0:8085]
//!   --from-device <PATH>          Channel to read device frames from [default: /tmp/fromC]
//!   --to-device <PATH>            Channel to write command frames to [default: /tmp/toC]
//!   --queue-capacity <N>          Outbound messages buffered per client [default: 32]
//!   --codec <json|bincode>        Client message encoding [default: bincode]
//!   --read-idle-timeout <SECS>    Close clients silent for this long [default: never]
//!   --write-timeout <SECS>        Close clients whose socket stalls [default: never]
//!   --receive-retry-limit <N>     Consecutive device read failures tolerated [default: 0]
//! ```
//!
//! # Configuration precedence
//!
//! Built-in defaults, then the `--config` file, then CLI flags.  Every flag can
//! also be given as an environment variable; a flag on the command line wins
//! over the variable.
//!
//! | Variable                       | Flag                    |
//! |--------------------------------|-------------------------|
//! | `THERMAL_CONFIG`               | `--config`              |
//! | `THERMAL_WS_BIND`              | `--ws-bind`             |
//! | `THERMAL_FROM_DEVICE`          | `--from-device`         |
//! | `THERMAL_TO_DEVICE`            | `--to-device`           |
//! | `THERMAL_QUEUE_CAPACITY`       | `--queue-capacity`      |
//! | `THERMAL_CODEC`                | `--codec`               |
//! | `THERMAL_READ_IDLE_TIMEOUT`    | `--read-idle-timeout`   |
//! | `THERMAL_WRITE_TIMEOUT`        | `--write-timeout`       |
//! | `THERMAL_RECEIVE_RETRY_LIMIT`  | `--receive-retry-limit` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use thermal_bridge::domain::{BridgeConfig, CodecKind};
use thermal_bridge::infrastructure::{run_bridge, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Thermal camera WebSocket bridge.
///
/// Every field is optional so that an unset flag does not override the config
/// file.
#[derive(Debug, Parser)]
#[command(
    name = "thermal-bridge",
    about = "WebSocket fan-out bridge for the thermal camera control process",
    version
)]
struct Cli {
    /// TOML file with any of the settings below.
    #[arg(long, env = "THERMAL_CONFIG")]
    config: Option<PathBuf>,

    /// Address the WebSocket server listens on, e.g. `127.0.0.1:8085`.
    #[arg(long, env = "THERMAL_WS_BIND")]
    ws_bind: Option<SocketAddr>,

    /// Channel the device process writes frames into.
    #[arg(long, env = "THERMAL_FROM_DEVICE")]
    from_device: Option<PathBuf>,

    /// Channel the device process reads frames from.
    #[arg(long, env = "THERMAL_TO_DEVICE")]
    to_device: Option<PathBuf>,

    /// Outbound messages buffered per client before it is evicted.
    #[arg(long, env = "THERMAL_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Client message encoding: `json` or `bincode`.
    #[arg(long, env = "THERMAL_CODEC")]
    codec: Option<CodecKind>,

    /// Seconds without client traffic before the session is closed.
    #[arg(long, env = "THERMAL_READ_IDLE_TIMEOUT")]
    read_idle_timeout: Option<u64>,

    /// Seconds a single socket write may take before the session is closed.
    #[arg(long, env = "THERMAL_WRITE_TIMEOUT")]
    write_timeout: Option<u64>,

    /// Consecutive failed device reads tolerated before the bridge stops.
    #[arg(long, env = "THERMAL_RECEIVE_RETRY_LIMIT")]
    receive_retry_limit: Option<u32>,
}

impl Cli {
    /// Builds the effective [`BridgeConfig`]: defaults, then the config file,
    /// then the flags that were given.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if the
    /// queue capacity is zero.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = BridgeConfig::default();

        if let Some(path) = &self.config {
            FileConfig::load(path)
                .and_then(|file| file.apply_to(&mut config))
                .with_context(|| format!("failed to load config file {}", path.display()))?;
        }

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
            anyhow::ensure!(capacity > 0, "--queue-capacity must be at least 1");
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

        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. `tracing_subscriber` is initialised; `RUST_LOG` sets the level
///    (default `info`).
/// 2. CLI arguments and the optional config file are merged into a
///    [`BridgeConfig`].
/// 3. A Ctrl+C handler is spawned that clears a shared `AtomicBool`.
/// 4. [`run_bridge`] binds the listener, opens both device channels and runs
///    until the flag is cleared or the device link is lost.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = Cli::parse().into_bridge_config()?;

    info!(
        "thermal bridge starting: ws={}, from-device={}, to-device={}, codec={}, queue={}",
        config.ws_bind_addr,
        config.from_device_path.display(),
        config.to_device_path.display(),
        config.codec,
        config.session_queue_capacity
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main loop ─────────────────────────────────────────────────────────────
    run_bridge(config, running).await?;

    info!("thermal bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
