//! Error types for the session layer.

use planpoker_transport::ConnectionId;

/// Errors that can occur during session bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the connection. It was never registered or
    /// has already disconnected.
    #[error("no session for {0}")]
    NotFound(ConnectionId),

    /// A session for the connection is already registered.
    #[error("{0} already has a session")]
    AlreadyConnected(ConnectionId),
}
