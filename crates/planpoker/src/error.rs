//! Unified error type for the planpoker server.

use planpoker_protocol::ProtocolError;
use planpoker_room::RoomError;
use planpoker_session::SessionError;
use planpoker_store::StoreError;
use planpoker_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// Only startup and connection-task failures surface as this type. Errors
/// caused by a client's event are turned into `error` events for that
/// client by the dispatcher and never reach here.
#[derive(Debug, thiserror::Error)]
pub enum PlanpokerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// An environment variable held an unusable value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Binding or serving the health listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The tracing subscriber could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(String),
}
