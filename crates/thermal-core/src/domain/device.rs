//! Values reported by the camera device.
//!
//! [`DeviceState`] is the snapshot of the three measurable quantities the
//! bridge tracks.  It is a plain value type; the shared, lock-protected copy
//! lives in the bridge's state cache.

use serde::{Deserialize, Serialize};

/// Palette applied to the thermal image.
///
/// The ordinals are shared with the device process and the browser client.
/// Any other ordinal the device reports is kept as [`ColorScheme::Other`]
/// rather than rejected: the bridge stores what the device says.
///
/// Serialized as the bare integer ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ColorScheme {
    #[default]
    Unknown,
    Sepia,
    BlackHot,
    WhiteHot,
    /// An ordinal outside the known set.
    Other(i32),
}

impl ColorScheme {
    /// Maps a wire ordinal to a scheme.  Never fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use thermal_core::ColorScheme;
    ///
    /// assert_eq!(ColorScheme::from_ordinal(2), ColorScheme::BlackHot);
    /// assert_eq!(ColorScheme::from_ordinal(17), ColorScheme::Other(17));
    /// ```
    pub fn from_ordinal(ordinal: i32) -> Self {
        match ordinal {
            0 => ColorScheme::Unknown,
            1 => ColorScheme::Sepia,
            2 => ColorScheme::BlackHot,
            3 => ColorScheme::WhiteHot,
            other => ColorScheme::Other(other),
        }
    }

    /// The wire ordinal for this scheme.
    pub fn ordinal(self) -> i32 {
        match self {
            ColorScheme::Unknown => 0,
            ColorScheme::Sepia => 1,
            ColorScheme::BlackHot => 2,
            ColorScheme::WhiteHot => 3,
            ColorScheme::Other(ordinal) => ordinal,
        }
    }

    /// Upper-case display name used in log messages (`"BLACK_HOT"` etc.).
    pub fn name(self) -> &'static str {
        match self {
            ColorScheme::Unknown => "UNKNOWN",
            ColorScheme::Sepia => "SEPIA",
            ColorScheme::BlackHot => "BLACK_HOT",
            ColorScheme::WhiteHot => "WHITE_HOT",
            ColorScheme::Other(_) => "OTHER",
        }
    }
}

impl From<i32> for ColorScheme {
    fn from(ordinal: i32) -> Self {
        ColorScheme::from_ordinal(ordinal)
    }
}

impl From<ColorScheme> for i32 {
    fn from(scheme: ColorScheme) -> Self {
        scheme.ordinal()
    }
}

/// Last-known values reported by the device.
///
/// Before the first frame of a kind arrives the corresponding field holds its
/// default (`0`, [`ColorScheme::Unknown`], `0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceState {
    pub zoom_level: i32,
    pub color_scheme: ColorScheme,
    pub battery_level: i32,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
