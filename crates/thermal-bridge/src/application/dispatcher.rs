//! Inbound dispatcher: what happens to each frame the device sends.
//!
//! For every frame the dispatcher:
//!
//! 1. looks the id up ([`interpret_frame`]); unknown ids are logged and dropped;
//! 2. stores the value in the [`DeviceStateCache`];
//! 3. encodes a single-field update with the client codec;
//! 4. hands it to [`SessionRegistry::broadcast`].
//!
//! The cache is updated *before* the broadcast.  Together with the locking in
//! [`SessionRegistry::admit`], this means a client that joins concurrently
//! either sees the new value in its initial sync or receives the broadcast.
//!
//! The loop that pulls frames off the device channel lives in the
//! infrastructure layer (`infrastructure::device_link::pump_device_frames`);
//! this type only knows what to do with a frame once it has one.

use std::sync::Arc;

use thermal_core::Frame;
use tracing::{debug, error, warn};

use crate::application::bridge_service::{apply_reading, interpret_frame, DeviceReading};
use crate::application::codec::MessageCodec;
use crate::application::registry::{BroadcastReport, SessionRegistry};
use crate::application::state_cache::DeviceStateCache;

/// Result of dispatching one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The frame updated the cache and was broadcast.
    Broadcast {
        reading: DeviceReading,
        report: BroadcastReport,
    },
    /// The frame id is not one the bridge understands.
    Unrecognized { id: u32 },
    /// The cache was updated but the update could not be encoded for clients.
    EncodeFailed { reading: DeviceReading },
}

/// Routes device frames into the state cache and out to every session.
pub struct InboundDispatcher {
    cache: Arc<DeviceStateCache>,
    registry: Arc<SessionRegistry>,
    codec: Arc<dyn MessageCodec>,
}

impl InboundDispatcher {
    pub fn new(
        cache: Arc<DeviceStateCache>,
        registry: Arc<SessionRegistry>,
        codec: Arc<dyn MessageCodec>,
    ) -> Self {
        Self {
            cache,
            registry,
            codec,
        }
    }

    /// Handles one decoded frame.  Never fails: every problem is logged and
    /// reported through the returned [`DispatchOutcome`].
    pub fn dispatch(&self, frame: &Frame) -> DispatchOutcome {
        let Some(reading) = interpret_frame(frame) else {
            warn!("ignoring device frame with unknown id {}", frame.id());
            return DispatchOutcome::Unrecognized { id: frame.id() };
        };

        let update = apply_reading(&self.cache, reading);

        let message = match self.codec.encode_update(&update) {
            Ok(message) => message,
            Err(e) => {
                error!("failed to encode {reading:?} with {} codec: {e}", self.codec.name());
                return DispatchOutcome::EncodeFailed { reading };
            }
        };

        let report = self.registry.broadcast(&message);
        debug!(
            "device {reading:?} broadcast to {} session(s), {} evicted",
            report.delivered, report.evicted
        );
        DispatchOutcome::Broadcast { reading, report }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
