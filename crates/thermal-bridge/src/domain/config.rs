//! Bridge configuration types.
//!
//! [`BridgeConfig`] holds every runtime setting.  `main.rs` fills it from
//! defaults, the optional TOML file and the command line; tests build it
//! directly.  Nothing in this module reads files or environment variables.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Well-known path of the channel the device process writes frames into.
pub const DEFAULT_FROM_DEVICE_PATH: &str = "/tmp/fromC";

/// Well-known path of the channel the device process reads frames from.
pub const DEFAULT_TO_DEVICE_PATH: &str = "/tmp/toC";

/// Default number of outbound messages a session may have queued before the
/// broadcaster evicts it.
pub const DEFAULT_SESSION_QUEUE_CAPACITY: usize = 32;

/// Which encoding the bridge uses for client-facing WebSocket messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// JSON objects in WebSocket text frames.
    Json,
    /// `bincode` records in WebSocket binary frames.
    #[default]
    Bincode,
}

impl FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(CodecKind::Json),
            "bincode" => Ok(CodecKind::Bincode),
            other => Err(format!("unknown codec '{other}' (expected 'json' or 'bincode')")),
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecKind::Json => f.write_str("json"),
            CodecKind::Bincode => f.write_str("bincode"),
        }
    }
}

/// Per-session timeout policy.
///
/// `None` means "wait forever", which matches the behaviour of a plain socket:
/// an idle client holds its reader task indefinitely.  Setting a timeout lets
/// the bridge reclaim sessions from clients that stop talking or stop reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionPolicy {
    /// Close the session when the client sends nothing for this long.
    pub read_idle_timeout: Option<Duration>,
    /// Close the session when a single socket write takes longer than this.
    pub write_timeout: Option<Duration>,
}

/// All runtime configuration for the bridge.
///
/// Build this struct once at startup and share it (by value or in an `Arc`)
/// with the components that need it.
///
/// # Example
///
/// ```rust
/// use thermal_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 8085);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The address and port the WebSocket server binds to.
    ///
    /// `0.0.0.0` accepts connections from any network interface.
    pub ws_bind_addr: SocketAddr,

    /// Channel the bridge reads device frames from.
    pub from_device_path: PathBuf,

    /// Channel the bridge writes command frames to.
    pub to_device_path: PathBuf,

    /// Capacity of each session's outbound queue.
    ///
    /// This is the only flow-control knob: a larger bound tolerates longer
    /// bursts from the device at the cost of memory per client.
    pub session_queue_capacity: usize,

    /// Client-facing message encoding.
    pub codec: CodecKind,

    /// Read/write timeouts applied to every session.
    pub session_policy: SessionPolicy,

    /// How many *consecutive* failed device reads the inbound pump tolerates
    /// before it stops.  `0` stops on the first failure.
    pub receive_retry_limit: u32,
}

impl Default for BridgeConfig {
    /// | Field                  | Default         |
    /// |------------------------|-----------------|
    /// | ws_bind_addr           | `0.0.0.0:8085`  |
    /// | from_device_path       | `/tmp/fromC`    |
    /// | to_device_path         | `/tmp/toC`      |
    /// | session_queue_capacity | 32              |
    /// | codec                  | bincode         |
    /// | session_policy         | no timeouts     |
    /// | receive_retry_limit    | 0               |
    fn default() -> Self {
        Self {
            ws_bind_addr: SocketAddr::from(([0, 0, 0, 0], 8085)),
            from_device_path: PathBuf::from(DEFAULT_FROM_DEVICE_PATH),
            to_device_path: PathBuf::from(DEFAULT_TO_DEVICE_PATH),
            session_queue_capacity: DEFAULT_SESSION_QUEUE_CAPACITY,
            codec: CodecKind::Bincode,
            session_policy: SessionPolicy::default(),
            receive_retry_limit: 0,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
