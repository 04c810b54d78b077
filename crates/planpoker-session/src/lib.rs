//! Connection session tracking for Planpoker.
//!
//! A session is the server's record of one live connection and, once the
//! client has joined a room, which room and user it speaks for. Sessions
//! are never persisted: after a restart clients rejoin with their stored
//! user id and get a fresh session.
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher (above)  ← resolves room audiences and kick targets here
//!     ↕
//! Session Layer (this crate)  ← connection → (room, user)
//!     ↕
//! Transport / Protocol (below)  ← ConnectionId, RoomCode, UserId
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{Binding, Session, SessionState};
