//! Fixed-size binary frame codec for the device channels.
//!
//! Wire format:
//! ```text
//! [id:4][payload:64]
//! ```
//! Total frame size: 68 bytes.  The id is little-endian.  There is no length
//! prefix: framing relies entirely on the fixed record length, so a reader
//! always consumes exactly [`FRAME_SIZE`] bytes per frame.
//!
//! The codec does not interpret the payload.  Deciding what the bytes mean is
//! the job of whoever looks at the frame id (see [`crate::FrameKind`]).

use thiserror::Error;

/// Size of the payload section of every frame, in bytes.
pub const PAYLOAD_SIZE: usize = 64;

/// Total size of an encoded frame: 4-byte id plus the payload.
pub const FRAME_SIZE: usize = 4 + PAYLOAD_SIZE;

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The byte slice is not exactly one frame long.
    #[error("malformed frame: expected {expected} bytes, got {actual}")]
    Malformed { expected: usize, actual: usize },
}

/// One record exchanged with the device process.
///
/// A frame is immutable once constructed.  Use [`Frame::new`] to build one
/// from an arbitrary byte slice (zero-padded or truncated to
/// [`PAYLOAD_SIZE`]), or [`Frame::with_i32`] for the common "single integer"
/// payload shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: u32,
    payload: [u8; PAYLOAD_SIZE],
}

impl Frame {
    /// Builds a frame, zero-padding or truncating `payload` to [`PAYLOAD_SIZE`].
    pub fn new(id: u32, payload: &[u8]) -> Self {
        let mut buf = [0u8; PAYLOAD_SIZE];
        let n = payload.len().min(PAYLOAD_SIZE);
        buf[..n].copy_from_slice(&payload[..n]);
        Self { id, payload: buf }
    }

    /// Builds a frame whose payload starts with `value` as a little-endian
    /// `i32`; the remaining 60 bytes are zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use thermal_core::Frame;
    ///
    /// let frame = Frame::with_i32(1, 42);
    /// assert_eq!(frame.id(), 1);
    /// assert_eq!(frame.read_i32(), 42);
    /// ```
    pub fn with_i32(id: u32, value: i32) -> Self {
        Self::new(id, &value.to_le_bytes())
    }

    /// The frame id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The full 64-byte payload.
    pub fn payload(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.payload
    }

    /// Reads the leading 4 payload bytes as a little-endian `i32`.
    ///
    /// The device encodes every known value this way; the rest of the payload
    /// is ignored.
    pub fn read_i32(&self) -> i32 {
        i32::from_le_bytes([
            self.payload[0],
            self.payload[1],
            self.payload[2],
            self.payload[3],
        ])
    }

    /// Encodes this frame into its wire representation.
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        encode_frame(self.id, &self.payload)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `id` and `payload` into exactly [`FRAME_SIZE`] bytes.
///
/// `payload` is zero-padded when shorter than [`PAYLOAD_SIZE`] and truncated
/// when longer.
///
/// # Examples
///
/// ```rust
/// use thermal_core::protocol::{decode_frame, encode_frame, FRAME_SIZE};
///
/// let bytes = encode_frame(3, &[88, 0, 0, 0]);
/// assert_eq!(bytes.len(), FRAME_SIZE);
/// let frame = decode_frame(&bytes).unwrap();
/// assert_eq!(frame.id(), 3);
/// assert_eq!(frame.read_i32(), 88);
/// ```
pub fn encode_frame(id: u32, payload: &[u8]) -> [u8; FRAME_SIZE] {
    let mut buf = [0u8; FRAME_SIZE];
    buf[..4].copy_from_slice(&id.to_le_bytes());
    let n = payload.len().min(PAYLOAD_SIZE);
    buf[4..4 + n].copy_from_slice(&payload[..n]);
    buf
}

/// Decodes one frame from `bytes`, which must be exactly [`FRAME_SIZE`] long.
///
/// # Errors
///
/// Returns [`FrameError::Malformed`] for any other length.  Nothing is
/// decoded in that case.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    if bytes.len() != FRAME_SIZE {
        return Err(FrameError::Malformed {
            expected: FRAME_SIZE,
            actual: bytes.len(),
        });
    }

    let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let mut payload = [0u8; PAYLOAD_SIZE];
    payload.copy_from_slice(&bytes[4..]);
    Ok(Frame { id, payload })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
