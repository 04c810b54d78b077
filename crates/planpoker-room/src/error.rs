//! Error types for the room layer.
//!
//! A missing room or user is not an error: engine operations report it as
//! `Ok(None)`. Only storage trouble surfaces here.

use planpoker_protocol::RoomCode;
use planpoker_store::StoreError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The store failed or timed out. The operation did not happen.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// A stored snapshot could not be parsed.
    #[error("room {room_code} has a corrupt snapshot: {source}")]
    Corrupt {
        room_code: RoomCode,
        #[source]
        source: serde_json::Error,
    },

    /// A snapshot could not be serialized for saving.
    #[error("room {room_code} could not be serialized: {source}")]
    Encode {
        room_code: RoomCode,
        #[source]
        source: serde_json::Error,
    },
}
