//! Core translation logic between device frames and client messages.
//!
//! This module provides pure functions that translate between the two
//! representations used by the bridge:
//!
//! - **Device side**: fixed-size [`Frame`]s
//! - **Client side**: [`ClientCommand`] / [`DeviceUpdate`]
//!
//! The functions have no I/O side effects, which keeps them trivially
//! testable.
//!
//! # Translation directions
//!
//! ```text
//! Client → Device:  ClientCommand → Frame           call: command_to_frame()
//! Device → Client:  Frame → DeviceReading            call: interpret_frame()
//!                   DeviceReading → cache + update   call: apply_reading()
//!                   cache snapshot → first message   call: initial_sync()
//! ```

use thermal_core::{ColorScheme, Frame, FrameKind};
use tracing::error;

use crate::application::codec::MessageCodec;
use crate::application::state_cache::DeviceStateCache;
use crate::domain::messages::{ClientCommand, DeviceUpdate, OutMessage};

/// A typed value extracted from a recognised device frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceReading {
    ZoomLevel(i32),
    ColorScheme(ColorScheme),
    BatteryLevel(i32),
}

// ── Client → Device ───────────────────────────────────────────────────────────

/// Translates a client command into the frame the device expects.
///
/// # Example
///
/// ```rust
/// use thermal_bridge::application::command_to_frame;
/// use thermal_bridge::domain::ClientCommand;
///
/// let frame = command_to_frame(&ClientCommand::SetZoomLevel { level: 3 });
/// assert_eq!(frame.id(), 1);
/// assert_eq!(frame.read_i32(), 3);
/// ```
pub fn command_to_frame(command: &ClientCommand) -> Frame {
    match command {
        ClientCommand::SetZoomLevel { level } => {
            Frame::with_i32(FrameKind::SetZoomLevel.id(), *level)
        }
        ClientCommand::SetColorScheme { scheme } => {
            Frame::with_i32(FrameKind::SetColorScheme.id(), scheme.ordinal())
        }
    }
}

// ── Device → Client ───────────────────────────────────────────────────────────

/// Reads the typed value out of a device frame.
///
/// Returns `None` for ids outside [`FrameKind`]; the caller logs and skips
/// those frames.
pub fn interpret_frame(frame: &Frame) -> Option<DeviceReading> {
    let kind = FrameKind::try_from(frame.id()).ok()?;
    let value = frame.read_i32();
    Some(match kind {
        FrameKind::SetZoomLevel => DeviceReading::ZoomLevel(value),
        FrameKind::SetColorScheme => DeviceReading::ColorScheme(ColorScheme::from_ordinal(value)),
        FrameKind::ChargeLevel => DeviceReading::BatteryLevel(value),
    })
}

/// Stores `reading` in the cache and returns the single-field update that
/// clients should receive for it.
pub fn apply_reading(cache: &DeviceStateCache, reading: DeviceReading) -> DeviceUpdate {
    match reading {
        DeviceReading::ZoomLevel(level) => {
            cache.update_zoom_level(level);
            DeviceUpdate::zoom_level(level)
        }
        DeviceReading::ColorScheme(scheme) => {
            cache.update_color_scheme(scheme);
            DeviceUpdate::color_scheme(scheme)
        }
        DeviceReading::BatteryLevel(level) => {
            cache.update_battery_level(level);
            DeviceUpdate::charge_level(level)
        }
    }
}

/// Builds the first message a newly joined client receives: the full cached
/// state, encoded with `codec`.
///
/// Returns `None` (after logging) if the codec fails; the client then simply
/// waits for the next live update.
pub fn initial_sync(cache: &DeviceStateCache, codec: &dyn MessageCodec) -> Option<OutMessage> {
    let update = DeviceUpdate::snapshot(&cache.snapshot());
    match codec.encode_update(&update) {
        Ok(message) => Some(message),
        Err(e) => {
            error!("failed to encode initial sync with {} codec: {e}", codec.name());
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
