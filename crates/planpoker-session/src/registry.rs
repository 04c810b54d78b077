//! The session registry: every live connection and what it is bound to.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is a plain data structure with no interior locking.
//! The dispatcher owns it behind a mutex and never holds that mutex across
//! storage calls.

use std::collections::{BTreeSet, HashMap};

use planpoker_protocol::{RoomCode, UserId};
use planpoker_transport::ConnectionId;

use crate::{Binding, Session, SessionError, SessionState};

/// Tracks live connections and their room bindings.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ bind() ──→ unbind() ──→ disconnect()
///                 │                         ▲
///                 └─────────────────────────┘
/// ```
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, Session>,

    /// Room code → connections bound to it. Kept in sync with the
    /// bindings in `sessions`; used for room fan-out and kick lookup.
    members: HashMap<RoomCode, BTreeSet<ConnectionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new, unbound connection.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if the connection is
    /// already registered.
    pub fn connect(&mut self, conn: ConnectionId) -> Result<(), SessionError> {
        if self.sessions.contains_key(&conn) {
            return Err(SessionError::AlreadyConnected(conn));
        }
        self.sessions.insert(conn, Session::new(conn));
        tracing::debug!(%conn, "session opened");
        Ok(())
    }

    /// Binds a connection to a room and user, replacing any previous
    /// binding. Returns the previous binding.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the connection is unknown.
    pub fn bind(
        &mut self,
        conn: ConnectionId,
        room_code: RoomCode,
        user_id: UserId,
    ) -> Result<Option<Binding>, SessionError> {
        let session = self
            .sessions
            .get_mut(&conn)
            .ok_or(SessionError::NotFound(conn))?;

        let previous = match std::mem::replace(
            &mut session.state,
            SessionState::Bound(Binding {
                room_code: room_code.clone(),
                user_id,
            }),
        ) {
            SessionState::Bound(previous) => Some(previous),
            SessionState::Unbound => None,
        };

        if let Some(previous) = &previous {
            self.forget_member(&previous.room_code, conn);
        }
        self.members.entry(room_code).or_default().insert(conn);
        Ok(previous)
    }

    /// Clears a connection's binding but keeps the session. Returns the
    /// binding that was cleared, if any.
    pub fn unbind(&mut self, conn: ConnectionId) -> Option<Binding> {
        let session = self.sessions.get_mut(&conn)?;
        let SessionState::Bound(binding) =
            std::mem::replace(&mut session.state, SessionState::Unbound)
        else {
            return None;
        };
        self.forget_member(&binding.room_code, conn);
        Some(binding)
    }

    /// The binding for a connection, if it is registered and in a room.
    pub fn lookup(&self, conn: ConnectionId) -> Option<&Binding> {
        self.sessions.get(&conn).and_then(Session::binding)
    }

    /// Finds the connection currently speaking for `user_id` in
    /// `room_code`. Only that room's members are scanned.
    pub fn find_connection_for(&self, room_code: &RoomCode, user_id: &UserId) -> Option<ConnectionId> {
        self.members.get(room_code)?.iter().copied().find(|conn| {
            self.lookup(*conn)
                .is_some_and(|b| &b.user_id == user_id)
        })
    }

    /// Connections bound to `room_code`, in allocation order.
    pub fn members(&self, room_code: &RoomCode) -> Vec<ConnectionId> {
        self.members
            .get(room_code)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Removes a connection entirely. Returns its last binding, if any.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Option<Binding> {
        let session = self.sessions.remove(&conn)?;
        tracing::debug!(%conn, "session closed");
        let SessionState::Bound(binding) = session.state else {
            return None;
        };
        self.forget_member(&binding.room_code, conn);
        Some(binding)
    }

    pub fn is_connected(&self, conn: ConnectionId) -> bool {
        self.sessions.contains_key(&conn)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn forget_member(&mut self, room_code: &RoomCode, conn: ConnectionId) {
        if let Some(set) = self.members.get_mut(room_code) {
            set.remove(&conn);
            if set.is_empty() {
                self.members.remove(room_code);
            }
        }
    }
}
