//! Client-facing message encodings.
//!
//! The bridge treats the client schema as an opaque capability: something that
//! turns a [`DeviceUpdate`] into bytes for the socket and turns bytes from the
//! socket back into a [`ClientCommand`].  [`MessageCodec`] is that capability.
//!
//! Two encodings ship with the bridge:
//!
//! | Codec            | Frame type | Library      |
//! |------------------|------------|--------------|
//! | [`BincodeCodec`] | binary     | `bincode`    |
//! | [`JsonCodec`]    | text       | `serde_json` |
//!
//! Binary frames are the default; JSON is there for clients that prefer text.
//!
//! Decoding does not care which WebSocket frame type carried the bytes, so a
//! client may send JSON in a binary frame.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::config::CodecKind;
use crate::domain::messages::{ClientCommand, DeviceUpdate, OutMessage};

/// Errors raised while encoding an update or decoding a command.
///
/// These are per-message failures: the caller logs them and moves on.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode codec error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Serialize/deserialize capability for client messages.
#[cfg_attr(test, mockall::automock)]
pub trait MessageCodec: Send + Sync {
    /// Encodes an update into a ready-to-queue outbound message.
    fn encode_update(&self, update: &DeviceUpdate) -> Result<OutMessage, CodecError>;

    /// Decodes one client message payload.
    fn decode_command(&self, bytes: &[u8]) -> Result<ClientCommand, CodecError>;

    /// Short name for log messages.
    fn name(&self) -> &'static str;
}

/// JSON in text frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode_update(&self, update: &DeviceUpdate) -> Result<OutMessage, CodecError> {
        let text = serde_json::to_string(update)?;
        Ok(OutMessage::Text(Arc::from(text)))
    }

    fn decode_command(&self, bytes: &[u8]) -> Result<ClientCommand, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// `bincode` 1.x records in binary frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl MessageCodec for BincodeCodec {
    fn encode_update(&self, update: &DeviceUpdate) -> Result<OutMessage, CodecError> {
        let bytes = bincode::serialize(update)?;
        Ok(OutMessage::Binary(Arc::from(bytes)))
    }

    fn decode_command(&self, bytes: &[u8]) -> Result<ClientCommand, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn name(&self) -> &'static str {
        "bincode"
    }
}

/// Returns the codec selected in configuration.
pub fn codec_for(kind: CodecKind) -> Arc<dyn MessageCodec> {
    match kind {
        CodecKind::Json => Arc::new(JsonCodec),
        CodecKind::Bincode => Arc::new(BincodeCodec),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
