//! The event dispatcher: one client event in, zero or more server events out.
//!
//! Every event that touches a room holds that room's [`RoomLocks`] guard
//! from the first load to the last broadcast, so two events for the same
//! room never interleave and their broadcasts leave in state order. The hub
//! mutex is only ever taken briefly and never held across a store call.

use chrono::Utc;
use planpoker_protocol::{
    Audience, ClientEvent, ErrorCode, ProtocolError, Room, RoomCode, RoomPhase, ServerEvent,
    UserId, is_allowed_vote,
};
use planpoker_room::{Admission, RoomError, RoomLocks, RoomService};
use planpoker_session::{Binding, SessionError};
use planpoker_store::Store;
use planpoker_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::hub::{Hub, Inbox};

const NOT_IN_ROOM: &str = "Not in a room";
const JOIN_FAILED: &str = "Failed to join room";
const LEAVE_FAILED: &str = "Failed to leave room";
const VOTE_FAILED: &str = "Failed to submit vote";
const CLEAR_FAILED: &str = "Failed to clear vote";
const REVEAL_FAILED: &str = "Failed to reveal votes";
const RESET_FAILED: &str = "Failed to reset round";
const KICK_FAILED: &str = "Failed to remove user";

/// Why a client event was refused. Sent back to the caller as an `error`
/// event; nothing is mutated or broadcast.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    /// The store failed. The caller only sees `context`.
    #[error("{context}")]
    Storage {
        context: &'static str,
        #[source]
        source: RoomError,
    },
}

impl DispatchError {
    /// The wire error class for this refusal.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Storage { .. } => ErrorCode::StorageFailure,
        }
    }
}

fn storage(context: &'static str) -> impl FnOnce(RoomError) -> DispatchError {
    move |source| DispatchError::Storage { context, source }
}

/// Routes client events to the room engine and fans results out to
/// connections.
///
/// Shared by every connection task behind an `Arc`.
pub struct Dispatcher<S: Store> {
    rooms: RoomService<S>,
    locks: RoomLocks,
    hub: Mutex<Hub>,
}

impl<S: Store> Dispatcher<S> {
    pub fn new(rooms: RoomService<S>) -> Self {
        Self {
            rooms,
            locks: RoomLocks::new(),
            hub: Mutex::new(Hub::default()),
        }
    }

    pub fn rooms(&self) -> &RoomService<S> {
        &self.rooms
    }

    /// Registers a new connection and greets it with `connect_success`.
    ///
    /// The returned inbox receives every event addressed to the
    /// connection until [`disconnect`](Self::disconnect) is called.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if `conn` is already
    /// registered.
    pub async fn connect(&self, conn: ConnectionId) -> Result<Inbox, SessionError> {
        let mut hub = self.hub.lock().await;
        let inbox = hub.register(conn)?;
        hub.deliver(&Audience::Connection(conn), ServerEvent::ConnectSuccess);
        Ok(inbox)
    }

    /// Handles one decoded client event. Refusals are reported to the
    /// caller; this never fails.
    pub async fn handle(&self, conn: ConnectionId, event: ClientEvent) {
        let name = event.name();
        let result = match event {
            ClientEvent::JoinRoom {
                room_code,
                user_name,
                user_id,
            } => self.join_room(conn, room_code, &user_name, user_id).await,
            ClientEvent::LeaveRoom => self.leave_room(conn).await,
            ClientEvent::SubmitVote { vote } => self.submit_vote(conn, &vote).await,
            ClientEvent::ClearVote => self.clear_vote(conn).await,
            ClientEvent::RevealVotes => self.reveal_votes(conn).await,
            ClientEvent::ResetRound => self.reset_round(conn).await,
            ClientEvent::KickUser { user_id } => self.kick_user(conn, user_id).await,
            ClientEvent::Heartbeat { client_time } => {
                self.heartbeat(conn, client_time).await;
                Ok(())
            }
        };

        if let Err(err) = result {
            match &err {
                DispatchError::Storage { source, .. } => {
                    tracing::error!(%conn, event = name, error = %source, "storage failure");
                }
                other => {
                    tracing::debug!(%conn, event = name, error = %other, "event refused");
                }
            }
            self.send(conn, ServerEvent::error(err.code(), err.to_string()))
                .await;
        }
    }

    /// Answers a frame that could not be turned into a [`ClientEvent`].
    pub async fn reject(&self, conn: ConnectionId, err: &ProtocolError) {
        tracing::debug!(%conn, error = %err, "malformed frame");
        let message = match err {
            ProtocolError::UnknownEvent(event) => format!("Unknown event: {event}"),
            ProtocolError::InvalidPayload { event, .. } => format!("Invalid data for {event}"),
            ProtocolError::InvalidRoomCode(_) => "Invalid room code".to_owned(),
            ProtocolError::Decode(_) | ProtocolError::Encode(_) => "Malformed message".to_owned(),
        };
        self.send(conn, ServerEvent::error(ErrorCode::InvalidInput, message))
            .await;
    }

    /// Forgets a connection. If it was in a room, its user stays in the
    /// room marked disconnected and the others are told.
    ///
    /// A user with another live connection in the same room is left
    /// connected.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let Some(Binding { room_code, user_id }) = self.hub.lock().await.remove(conn) else {
            tracing::debug!(%conn, "unbound connection closed");
            return;
        };

        self.mark_disconnected(&room_code, &user_id, conn).await;
    }

    /// Marks `user_id` disconnected in `room_code` and tells the room,
    /// unless another connection still speaks for the user there.
    async fn mark_disconnected(
        &self,
        room_code: &RoomCode,
        user_id: &UserId,
        conn: ConnectionId,
    ) {
        let _guard = self.locks.lock(room_code).await;
        let still_here = self
            .hub
            .lock()
            .await
            .sessions
            .find_connection_for(room_code, user_id);
        if let Some(other) = still_here {
            tracing::debug!(%conn, %other, %room_code, %user_id, "user still connected elsewhere");
            return;
        }

        match self
            .rooms
            .update_user_connection(room_code, user_id, false)
            .await
        {
            Ok(Some(_)) => {
                tracing::info!(%conn, %room_code, %user_id, "user disconnected");
                self.broadcast(
                    &Audience::RoomExcept(room_code.clone(), conn),
                    [ServerEvent::UserDisconnected {
                        user_id: user_id.clone(),
                    }],
                )
                .await;
            }
            Ok(None) => {
                tracing::debug!(%conn, %room_code, %user_id, "disconnected user already gone");
            }
            Err(e) => {
                tracing::error!(%conn, %room_code, %user_id, error = %e, "storage failure");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    async fn join_room(
        &self,
        conn: ConnectionId,
        room_code: RoomCode,
        user_name: &str,
        user_id: Option<UserId>,
    ) -> Result<(), DispatchError> {
        let name = user_name.trim();
        if name.is_empty() {
            return Err(DispatchError::InvalidInput("User name is required".into()));
        }

        let moved_from = self.enter_room(conn, room_code, name, user_id).await?;

        // The old room is locked only after the new one is released.
        if let Some(previous) = moved_from {
            self.mark_disconnected(&previous.room_code, &previous.user_id, conn)
                .await;
        }
        Ok(())
    }

    /// Admits the user under the room lock, binds the connection, and
    /// answers. Returns the binding the connection held in another room.
    async fn enter_room(
        &self,
        conn: ConnectionId,
        room_code: RoomCode,
        name: &str,
        user_id: Option<UserId>,
    ) -> Result<Option<Binding>, DispatchError> {
        let _guard = self.locks.lock(&room_code).await;
        self.rooms
            .create_room(Some(room_code.clone()))
            .await
            .map_err(storage(JOIN_FAILED))?;
        let (room, user, admission) = self
            .rooms
            .add_user(&room_code, name, user_id.as_ref())
            .await
            .map_err(storage(JOIN_FAILED))?
            .ok_or(DispatchError::NotFound(JOIN_FAILED))?;

        let mut hub = self.hub.lock().await;
        let moved_from = match hub.sessions.bind(conn, room_code.clone(), user.id.clone()) {
            Ok(Some(previous)) if previous.room_code != room_code => {
                tracing::info!(%conn, from = %previous.room_code, to = %room_code, "connection changed rooms");
                Some(previous)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(%conn, error = %e, "connection closed while joining");
                return Ok(None);
            }
        };

        let me = Audience::Connection(conn);
        hub.deliver(
            &me,
            ServerEvent::RoomJoined {
                room_code: room_code.clone(),
                user_id: user.id.clone(),
                is_facilitator: user.is_facilitator,
            },
        );
        hub.deliver(&me, ServerEvent::RoomState(room.redacted()));
        if admission == Admission::New {
            hub.deliver(
                &Audience::RoomExcept(room_code, conn),
                ServerEvent::UserJoined { user },
            );
        }
        Ok(moved_from)
    }

    async fn leave_room(&self, conn: ConnectionId) -> Result<(), DispatchError> {
        let Some(Binding { room_code, user_id }) = self.binding(conn).await else {
            return Ok(());
        };

        let _guard = self.locks.lock(&room_code).await;
        let room = self
            .rooms
            .remove_user(&room_code, &user_id)
            .await
            .map_err(storage(LEAVE_FAILED))?;

        let mut hub = self.hub.lock().await;
        hub.sessions.unbind(conn);
        tracing::info!(%conn, %room_code, %user_id, "user left");
        if let Some(room) = room {
            let everyone = Audience::Room(room_code);
            hub.deliver(&everyone, ServerEvent::UserLeft { user_id });
            hub.deliver(&everyone, ServerEvent::RoomState(room.redacted()));
        }
        Ok(())
    }

    async fn submit_vote(&self, conn: ConnectionId, vote: &str) -> Result<(), DispatchError> {
        let Binding { room_code, user_id } = self.require_binding(conn).await?;
        if !is_allowed_vote(vote) {
            return Err(DispatchError::InvalidInput("Invalid vote value".into()));
        }

        let _guard = self.locks.lock(&room_code).await;
        let room = self
            .rooms
            .get_room(&room_code)
            .await
            .map_err(storage(VOTE_FAILED))?
            .ok_or(DispatchError::NotFound(VOTE_FAILED))?;
        if room.state == RoomPhase::Revealed {
            return Err(DispatchError::Conflict("Votes are already revealed"));
        }

        self.rooms
            .submit_vote(&room_code, &user_id, vote)
            .await
            .map_err(storage(VOTE_FAILED))?
            .ok_or(DispatchError::NotFound(VOTE_FAILED))?;
        tracing::debug!(%room_code, %user_id, "vote recorded");
        self.broadcast(
            &Audience::Room(room_code),
            [ServerEvent::VoteSubmitted { user_id }],
        )
        .await;
        Ok(())
    }

    async fn clear_vote(&self, conn: ConnectionId) -> Result<(), DispatchError> {
        let Some(Binding { room_code, user_id }) = self.binding(conn).await else {
            return Ok(());
        };

        let _guard = self.locks.lock(&room_code).await;
        let cleared = self
            .rooms
            .clear_vote(&room_code, &user_id)
            .await
            .map_err(storage(CLEAR_FAILED))?;
        if cleared.is_some() {
            self.broadcast(
                &Audience::Room(room_code),
                [ServerEvent::VoteCleared { user_id }],
            )
            .await;
        }
        Ok(())
    }

    async fn reveal_votes(&self, conn: ConnectionId) -> Result<(), DispatchError> {
        let Binding { room_code, user_id } = self.require_binding(conn).await?;

        let _guard = self.locks.lock(&room_code).await;
        self.authorize(&room_code, &user_id, "Only facilitator can reveal votes", REVEAL_FAILED)
            .await?;
        let room = self
            .rooms
            .reveal_votes(&room_code)
            .await
            .map_err(storage(REVEAL_FAILED))?
            .ok_or(DispatchError::NotFound(REVEAL_FAILED))?;

        self.broadcast(
            &Audience::Room(room_code),
            [ServerEvent::VotesRevealed {
                votes: room.current_votes(),
            }],
        )
        .await;
        Ok(())
    }

    async fn reset_round(&self, conn: ConnectionId) -> Result<(), DispatchError> {
        let Binding { room_code, user_id } = self.require_binding(conn).await?;

        let _guard = self.locks.lock(&room_code).await;
        self.authorize(&room_code, &user_id, "Only facilitator can reset round", RESET_FAILED)
            .await?;
        let room = self
            .rooms
            .reset_round(&room_code)
            .await
            .map_err(storage(RESET_FAILED))?
            .ok_or(DispatchError::NotFound(RESET_FAILED))?;

        self.broadcast(
            &Audience::Room(room_code),
            [ServerEvent::RoundReset {
                round: room.current_round,
            }],
        )
        .await;
        Ok(())
    }

    async fn kick_user(&self, conn: ConnectionId, target: UserId) -> Result<(), DispatchError> {
        let Binding {
            room_code,
            user_id: actor,
        } = self.require_binding(conn).await?;

        let _guard = self.locks.lock(&room_code).await;
        let room = self
            .authorize(&room_code, &actor, "Only facilitator can remove users", KICK_FAILED)
            .await?;
        if target == actor {
            return Err(DispatchError::Unauthorized("You cannot remove yourself"));
        }
        if !room.contains(&target) {
            return Err(DispatchError::NotFound("User not found in room"));
        }

        let room = self
            .rooms
            .remove_user(&room_code, &target)
            .await
            .map_err(storage(KICK_FAILED))?;

        let mut hub = self.hub.lock().await;
        while let Some(target_conn) = hub.sessions.find_connection_for(&room_code, &target) {
            hub.deliver(
                &Audience::Connection(target_conn),
                ServerEvent::UserKicked {
                    user_id: target.clone(),
                    kicked_by: actor.clone(),
                },
            );
            hub.sessions.unbind(target_conn);
        }
        tracing::info!(%room_code, kicked = %target, by = %actor, "user kicked");

        if let Some(room) = room {
            let everyone = Audience::Room(room_code);
            hub.deliver(&everyone, ServerEvent::UserLeft { user_id: target });
            hub.deliver(&everyone, ServerEvent::RoomState(room.redacted()));
        }
        Ok(())
    }

    async fn heartbeat(&self, conn: ConnectionId, client_time: u64) {
        let server_time = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        self.send(
            conn,
            ServerEvent::HeartbeatAck {
                client_time,
                server_time,
            },
        )
        .await;
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    async fn binding(&self, conn: ConnectionId) -> Option<Binding> {
        self.hub.lock().await.sessions.lookup(conn).cloned()
    }

    async fn require_binding(&self, conn: ConnectionId) -> Result<Binding, DispatchError> {
        self.binding(conn)
            .await
            .ok_or(DispatchError::NotFound(NOT_IN_ROOM))
    }

    /// Loads the room and checks that `user_id` is its facilitator.
    async fn authorize(
        &self,
        room_code: &RoomCode,
        user_id: &UserId,
        denied: &'static str,
        failed: &'static str,
    ) -> Result<Room, DispatchError> {
        match self.rooms.get_room(room_code).await.map_err(storage(failed))? {
            Some(room) if room.is_facilitator(user_id) => Ok(room),
            _ => Err(DispatchError::Unauthorized(denied)),
        }
    }

    async fn send(&self, conn: ConnectionId, event: ServerEvent) {
        self.hub
            .lock()
            .await
            .deliver(&Audience::Connection(conn), event);
    }

    async fn broadcast<I>(&self, audience: &Audience, events: I)
    where
        I: IntoIterator<Item = ServerEvent>,
    {
        let hub = self.hub.lock().await;
        for event in events {
            hub.deliver(audience, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planpoker_store::StoreError;

    #[test]
    fn test_dispatch_error_codes() {
        assert_eq!(
            DispatchError::InvalidInput("x".into()).code(),
            ErrorCode::InvalidInput
        );
        assert_eq!(DispatchError::Unauthorized("x").code(), ErrorCode::Unauthorized);
        assert_eq!(DispatchError::NotFound("x").code(), ErrorCode::NotFound);
        assert_eq!(DispatchError::Conflict("x").code(), ErrorCode::Conflict);
        let err = storage(VOTE_FAILED)(RoomError::Storage(StoreError::Timeout("get")));
        assert_eq!(err.code(), ErrorCode::StorageFailure);
    }

    #[test]
    fn test_dispatch_error_storage_hides_cause() {
        let err = storage(JOIN_FAILED)(RoomError::Storage(StoreError::Timeout("set")));
        assert_eq!(err.to_string(), JOIN_FAILED);
    }
}
