//! Network edge of the planpoker server.
//!
//! The server loop is written against two small traits: a [`Transport`]
//! hands out [`Connection`]s, and a connection moves whole JSON frames.
//! WebSocket is the only implementation.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{DEFAULT_HANDSHAKE_TIMEOUT, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Process-local handle for one client connection.
///
/// Allocated from a counter and never reused while the process runs.
/// Ordering follows allocation, which keeps room fan-out deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener that yields client connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client and completes its upgrade.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// One client's frame channel.
///
/// Outbound frames are always text. Inbound frames may be text or binary
/// and are handed over as raw bytes. Every method takes `&self`; reads and
/// writes lock separately, so a parked [`recv`](Self::recv) never delays a
/// [`send`](Self::send).
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one text frame.
    async fn send(&self, frame: &str) -> Result<(), Self::Error>;

    /// Reads the next data frame. `Ok(None)` means the peer closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts the closing handshake.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
