//! Typed view of the frame ids known to the bridge.
//!
//! The numeric values are part of the contract with the device process, not a
//! convention: changing one breaks the wire format.  Unknown ids are *not*
//! rejected by the codec; they simply fail to convert into a [`FrameKind`]
//! and the caller decides what to do with them.

use serde::{Deserialize, Serialize};

/// All frame ids defined by the device protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum FrameKind {
    /// Zoom level.  Payload: leading little-endian `i32` level.
    SetZoomLevel = 1,
    /// Color scheme.  Payload: leading little-endian `i32` enum ordinal.
    SetColorScheme = 2,
    /// Battery charge telemetry.  Payload: leading little-endian `i32` value.
    ChargeLevel = 3,
}

impl FrameKind {
    /// The raw frame id for this kind.
    pub fn id(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for FrameKind {
    type Error = u32;

    /// Converts a raw id, returning the id itself as the error when unknown.
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FrameKind::SetZoomLevel),
            2 => Ok(FrameKind::SetColorScheme),
            3 => Ok(FrameKind::ChargeLevel),
            other => Err(other),
        }
    }
}
