//! # thermal-core
//!
//! Shared library for the thermal camera control bridge containing the
//! device frame codec and the device-state domain types.
//!
//! This crate has zero dependencies on OS APIs, async runtimes, or sockets.
//!
//! # Architecture overview (for beginners)
//!
//! The camera is driven by a separate control process.  The bridge talks to
//! that process over two one-way byte channels (named pipes) and relays what it
//! learns to any number of browser clients.
//!
//! - **`protocol`** – How bytes travel between the bridge and the device
//!   process.  Every record is a fixed-size frame: a 4-byte little-endian id
//!   followed by a 64-byte payload.
//!
//! - **`domain`** – The values the device reports (zoom level, color scheme,
//!   battery level) as plain Rust types.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `thermal_core::Frame` instead of `thermal_core::protocol::frame::Frame`.
pub use domain::device::{ColorScheme, DeviceState};
pub use protocol::frame::{decode_frame, encode_frame, Frame, FrameError, FRAME_SIZE, PAYLOAD_SIZE};
pub use protocol::kind::FrameKind;
