//! Message types for the client-facing WebSocket protocol.
//!
//! The device speaks fixed 68-byte frames.  Browser clients speak a small
//! message vocabulary instead:
//!
//! ```text
//! Client → Bridge:  ClientCommand  →  device frame
//! Bridge → Client:  device frame   →  DeviceUpdate  →  OutMessage
//! ```
//!
//! # Field naming
//!
//! Field and variant names are camelCase on the wire so a browser reads them
//! as ordinary JavaScript properties:
//!
//! ```json
//! {"setZoomLevel":{"level":42},"setColorScheme":null,"accChargeLevel":null}
//! {"setColorScheme":{"scheme":2}}
//! ```
//!
//! Each update field is a small record of its own (`level`, `scheme`,
//! `charge`), mirroring the shape of the matching command.
//!
//! Both types avoid internally tagged enums and skipped fields so they also
//! round-trip through non-self-describing formats such as `bincode`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thermal_core::{ColorScheme, DeviceState};

// ── Client → Bridge ───────────────────────────────────────────────────────────

/// A command a client asks the bridge to relay to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientCommand {
    /// Change the optical zoom.
    SetZoomLevel { level: i32 },
    /// Change the thermal palette.
    SetColorScheme { scheme: ColorScheme },
}

impl ClientCommand {
    /// Short variant name for log messages.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::SetZoomLevel { .. } => "SetZoomLevel",
            ClientCommand::SetColorScheme { .. } => "SetColorScheme",
        }
    }
}

// ── Bridge → Client ───────────────────────────────────────────────────────────

/// Zoom level reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomLevel {
    pub level: i32,
}

/// Palette reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSchemeSetting {
    pub scheme: ColorScheme,
}

/// Accessory battery charge in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeLevel {
    pub charge: i32,
}

/// A state update pushed to clients.
///
/// Every field is optional: a live update carries the single field the device
/// just reported, while the initial sync after connecting carries all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    #[serde(default)]
    pub set_zoom_level: Option<ZoomLevel>,
    #[serde(default)]
    pub set_color_scheme: Option<ColorSchemeSetting>,
    #[serde(default)]
    pub acc_charge_level: Option<ChargeLevel>,
}

impl DeviceUpdate {
    /// Update carrying only the zoom level.
    pub fn zoom_level(level: i32) -> Self {
        Self {
            set_zoom_level: Some(ZoomLevel { level }),
            ..Self::default()
        }
    }

    /// Update carrying only the color scheme.
    pub fn color_scheme(scheme: ColorScheme) -> Self {
        Self {
            set_color_scheme: Some(ColorSchemeSetting { scheme }),
            ..Self::default()
        }
    }

    /// Update carrying only the battery level.
    pub fn charge_level(charge: i32) -> Self {
        Self {
            acc_charge_level: Some(ChargeLevel { charge }),
            ..Self::default()
        }
    }

    /// Full snapshot used for the initial sync of a new client.
    pub fn snapshot(state: &DeviceState) -> Self {
        Self {
            set_zoom_level: Some(ZoomLevel {
                level: state.zoom_level,
            }),
            set_color_scheme: Some(ColorSchemeSetting {
                scheme: state.color_scheme,
            }),
            acc_charge_level: Some(ChargeLevel {
                charge: state.battery_level,
            }),
        }
    }
}

// ── Outbound queue unit ───────────────────────────────────────────────────────

/// One unit of delivery on a session's outbound queue.
///
/// The payload is already encoded; nothing downstream reinterprets it.  The
/// buffers are reference counted so a broadcast to many sessions clones a
/// pointer, not the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutMessage {
    /// Sent as a WebSocket binary frame.
    Binary(Arc<[u8]>),
    /// Sent as a WebSocket text frame.
    Text(Arc<str>),
    /// Ask the writer to send a Close frame and stop.
    Close,
}

impl OutMessage {
    /// Size of the encoded payload in bytes (`0` for `Close`).
    pub fn len(&self) -> usize {
        match self {
            OutMessage::Binary(bytes) => bytes.len(),
            OutMessage::Text(text) => text.len(),
            OutMessage::Close => 0,
        }
    }

    /// `true` when there is no payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape_is_camel_case() {
        // Arrange
        let cmd = ClientCommand::SetZoomLevel { level: 3 };

        // Act
        let json = serde_json::to_string(&cmd).unwrap();

        // Assert
        assert_eq!(json, r#"{"setZoomLevel":{"level":3}}"#);
    }

    #[test]
    fn test_color_scheme_command_parses_ordinal() {
        let cmd: ClientCommand = serde_json::from_str(r#"{"setColorScheme":{"scheme":3}}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::SetColorScheme {
                scheme: ColorScheme::WhiteHot
            }
        );
    }

    #[test]
    fn test_command_names() {
        assert_eq!(ClientCommand::SetZoomLevel { level: 1 }.name(), "SetZoomLevel");
        assert_eq!(
            ClientCommand::SetColorScheme {
                scheme: ColorScheme::Sepia
            }
            .name(),
            "SetColorScheme"
        );
    }

    #[test]
    fn test_single_field_updates_leave_others_empty() {
        let update = DeviceUpdate::charge_level(88);
        assert_eq!(update.acc_charge_level, Some(ChargeLevel { charge: 88 }));
        assert_eq!(update.set_zoom_level, None);
        assert_eq!(update.set_color_scheme, None);
    }

    #[test]
    fn test_snapshot_carries_all_three_fields() {
        // Arrange
        let state = DeviceState {
            zoom_level: 7,
            color_scheme: ColorScheme::BlackHot,
            battery_level: 88,
        };

        // Act
        let update = DeviceUpdate::snapshot(&state);

        // Assert
        assert_eq!(update.set_zoom_level, Some(ZoomLevel { level: 7 }));
        assert_eq!(
            update.set_color_scheme,
            Some(ColorSchemeSetting {
                scheme: ColorScheme::BlackHot
            })
        );
        assert_eq!(update.acc_charge_level, Some(ChargeLevel { charge: 88 }));
    }

    #[test]
    fn test_update_json_nests_each_field() {
        // Arrange
        let update = DeviceUpdate::color_scheme(ColorScheme::Sepia);

        // Act
        let json = serde_json::to_string(&update).unwrap();

        // Assert
        assert_eq!(
            json,
            r#"{"setZoomLevel":null,"setColorScheme":{"scheme":1},"accChargeLevel":null}"#
        );
    }

    #[test]
    fn test_update_json_accepts_missing_fields() {
        let update: DeviceUpdate =
            serde_json::from_str(r#"{"setZoomLevel":{"level":5}}"#).unwrap();
        assert_eq!(update, DeviceUpdate::zoom_level(5));
    }

    #[test]
    fn test_out_message_len() {
        assert_eq!(OutMessage::Binary(Arc::from(vec![1u8, 2, 3])).len(), 3);
        assert_eq!(OutMessage::Text(Arc::from("abcd")).len(), 4);
        assert!(OutMessage::Close.is_empty());
    }
}
