//! Domain types describing what the camera device reports.

pub mod device;

pub use device::{ColorScheme, DeviceState};
