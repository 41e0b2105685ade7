//! Protocol module containing the device frame codec and frame kinds.

pub mod frame;
pub mod kind;

pub use frame::{decode_frame, encode_frame, Frame, FrameError, FRAME_SIZE, PAYLOAD_SIZE};
pub use kind::FrameKind;
