//! Infrastructure layer for thermal-bridge.
//!
//! The infrastructure layer handles all I/O: the two device channels, the
//! WebSocket listener and its sessions, and the configuration file.
//!
//! # Responsibilities
//!
//! - Opening, reading, writing and reopening the device channels
//! - Pumping inbound device frames into the dispatcher
//! - Binding the client listener and performing the WebSocket handshake
//! - Running the writer and reader task of every session
//! - Handling the graceful shutdown signal
//! - Loading the optional TOML config file
//!
//! # What does NOT belong here?
//!
//! - Frame interpretation and command translation (application layer)
//! - Message type definitions (domain layer)
//! - CLI parsing (that is done in `main.rs`)

pub mod config_file;
pub mod device_link;
pub mod launcher;
pub mod session;
pub mod ws_server;

pub use config_file::{ConfigError, FileConfig};
pub use device_link::{
    pump_device_frames, CommandSink, DeviceChannels, FifoChannels, FrameReceiver, FrameSender,
    PacketTransport, TransportError,
};
pub use launcher::{run_bridge, run_bridge_with};
pub use ws_server::{bind, run_server, serve, BridgeContext};
