use std::net::SocketAddr;

/// Errors raised at the network edge.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TCP accept itself failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The client did not finish the upgrade in time.
    #[error("handshake with {0} timed out")]
    HandshakeTimeout(SocketAddr),

    /// The client sent something that is not a WebSocket upgrade.
    #[cfg(feature = "websocket")]
    #[error("handshake with {peer} failed: {source}")]
    Handshake {
        peer: SocketAddr,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    /// Writing a frame failed; the peer is most likely gone.
    #[cfg(feature = "websocket")]
    #[error("send failed: {0}")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),

    /// Reading a frame failed.
    #[cfg(feature = "websocket")]
    #[error("receive failed: {0}")]
    Receive(#[source] tokio_tungstenite::tungstenite::Error),
}
