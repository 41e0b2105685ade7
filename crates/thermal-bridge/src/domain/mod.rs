//! Domain layer for thermal-bridge.
//!
//! The domain layer contains pure types that have no dependencies on I/O,
//! networking, or async runtimes.
//!
//! # What belongs in the domain layer?
//!
//! - Client-facing message types (commands in, updates out)
//! - The outbound queue unit ([`OutMessage`])
//! - Configuration structures
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, pipe, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod messages;

// Re-export the most commonly needed types at the domain module boundary
// so callers can write `domain::BridgeConfig` instead of the longer path.
pub use config::{BridgeConfig, CodecKind, SessionPolicy};
pub use messages::{
    ChargeLevel, ClientCommand, ColorSchemeSetting, DeviceUpdate, OutMessage, ZoomLevel,
};
