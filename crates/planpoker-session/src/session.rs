//! Session types.

use std::time::Instant;

use planpoker_protocol::{RoomCode, UserId};
use planpoker_transport::ConnectionId;

/// The room and user a connection speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    pub room_code: RoomCode,
    pub user_id: UserId,
}

/// Where a connection is in its lifecycle.
///
/// ```text
///   Unbound ──(join_room)──→ Bound ──(leave_room / kicked)──→ Unbound
///                              │
///                              └──(join_room elsewhere)──→ Bound
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected but not in a room.
    Unbound,
    /// Joined to a room as a user.
    Bound(Binding),
}

/// One live connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub state: SessionState,
    pub connected_at: Instant,
}

impl Session {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            state: SessionState::Unbound,
            connected_at: Instant::now(),
        }
    }

    /// The current binding, if the session is in a room.
    pub fn binding(&self) -> Option<&Binding> {
        match &self.state {
            SessionState::Bound(binding) => Some(binding),
            SessionState::Unbound => None,
        }
    }
}
