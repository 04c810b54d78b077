//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or interpreting frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a JSON `{"event", "data"}` envelope.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope names an event the server does not handle.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The event is known but its `data` does not match the expected shape.
    #[error("invalid payload for {event}: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// A room code failed the format check.
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),
}
