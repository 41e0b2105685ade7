//! Application layer for thermal-bridge.
//!
//! The application layer knows *what* the bridge does with frames and client
//! messages, but delegates *how* bytes move to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Translating device frames into client updates and client commands into
//!   device frames
//! - Holding the last-known device state
//! - Tracking live sessions and fanning updates out to them
//! - Encoding/decoding client messages
//!
//! # What does NOT belong here?
//!
//! - Opening pipes or sockets, spawning tasks (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod bridge_service;
pub mod codec;
pub mod dispatcher;
pub mod registry;
pub mod state_cache;

// Re-export so callers can write `application::InboundDispatcher` instead of
// the full module path.
pub use bridge_service::{apply_reading, command_to_frame, initial_sync, interpret_frame, DeviceReading};
pub use codec::{codec_for, BincodeCodec, CodecError, JsonCodec, MessageCodec};
pub use dispatcher::{DispatchOutcome, InboundDispatcher};
pub use registry::{
    AdmitError, BroadcastReport, EnqueueError, Lifecycle, SessionEndpoints, SessionHandle,
    SessionId, SessionRegistry,
};
pub use state_cache::DeviceStateCache;
