//! Codec trait and the JSON implementation.
//!
//! Outbound frames go out as WebSocket text, so [`Codec::encode`] produces
//! a `String`. Inbound frames may arrive as text or binary and are decoded
//! from raw bytes.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts frames to and from their wire representation.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a received frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use planpoker_protocol::{Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let envelope: Envelope = codec
///     .decode(br#"{"event":"submit_vote","data":{"vote":"5"}}"#)
///     .unwrap();
/// assert_eq!(envelope.event, "submit_vote");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
