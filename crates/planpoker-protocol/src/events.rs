//! Real-time events.
//!
//! Every frame in either direction has the same shape:
//!
//! ```json
//! { "event": "submit_vote", "data": { "vote": "5" } }
//! ```
//!
//! Inbound frames are decoded in two steps. The [`Envelope`] is parsed
//! first so that an unknown event name and a malformed payload can be told
//! apart, then [`ClientEvent::from_envelope`] interprets `data` for the
//! named event. Events without a payload accept a missing, `null`, or
//! `{}` `data` field.

use std::collections::HashMap;
use std::fmt;

use planpoker_transport::ConnectionId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Room, RoomCode, User, UserId};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A raw inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// An inbound event after payload validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Join (or rejoin, when `user_id` is known to the room) a room,
    /// creating it if it does not exist.
    JoinRoom {
        room_code: RoomCode,
        user_name: String,
        user_id: Option<UserId>,
    },
    LeaveRoom,
    SubmitVote { vote: String },
    ClearVote,
    RevealVotes,
    ResetRound,
    KickUser { user_id: UserId },
    /// Keep-alive. `client_time` is echoed back in `heartbeat_ack`.
    Heartbeat { client_time: u64 },
}

#[derive(Deserialize)]
struct JoinRoomData {
    room_code: String,
    user_name: String,
    #[serde(default)]
    user_id: Option<UserId>,
}

#[derive(Deserialize)]
struct SubmitVoteData {
    vote: String,
}

#[derive(Deserialize)]
struct KickUserData {
    user_id: UserId,
}

#[derive(Deserialize)]
struct HeartbeatData {
    #[serde(default)]
    client_time: u64,
}

fn payload<T: DeserializeOwned>(
    event: &str,
    data: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload {
        event: event.to_string(),
        source,
    })
}

impl ClientEvent {
    /// Interprets an envelope's payload for its event name.
    ///
    /// # Errors
    /// - `UnknownEvent` if the name is not an inbound event.
    /// - `InvalidPayload` if a required field is missing or mistyped.
    /// - `InvalidRoomCode` if `join_room` carries a malformed code.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let Envelope { event, data } = envelope;
        let parsed = match event.as_str() {
            "join_room" => {
                let d: JoinRoomData = payload(&event, data)?;
                Self::JoinRoom {
                    room_code: RoomCode::parse(&d.room_code)?,
                    user_name: d.user_name,
                    user_id: d.user_id.filter(|id| !id.as_str().is_empty()),
                }
            }
            "leave_room" => Self::LeaveRoom,
            "submit_vote" => {
                let d: SubmitVoteData = payload(&event, data)?;
                Self::SubmitVote { vote: d.vote }
            }
            "clear_vote" => Self::ClearVote,
            "reveal_votes" => Self::RevealVotes,
            "reset_round" => Self::ResetRound,
            "kick_user" => {
                let d: KickUserData = payload(&event, data)?;
                Self::KickUser { user_id: d.user_id }
            }
            "heartbeat" => {
                let d: HeartbeatData = if data.is_null() {
                    HeartbeatData { client_time: 0 }
                } else {
                    payload(&event, data)?
                };
                Self::Heartbeat {
                    client_time: d.client_time,
                }
            }
            _ => return Err(ProtocolError::UnknownEvent(event)),
        };
        Ok(parsed)
    }

    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom => "leave_room",
            Self::SubmitVote { .. } => "submit_vote",
            Self::ClearVote => "clear_vote",
            Self::RevealVotes => "reveal_votes",
            Self::ResetRound => "reset_round",
            Self::KickUser { .. } => "kick_user",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Machine-readable error class carried by `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Empty name, disallowed vote, bad room code, or malformed frame.
    InvalidInput,
    /// The caller lacks the facilitator role, or tried to kick themselves.
    Unauthorized,
    /// The caller is not in a room, or the room or target user is gone.
    NotFound,
    /// The room is in the wrong phase for the request.
    Conflict,
    /// The store failed; the operation did not happen.
    StorageFailure,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidInput => "invalid_input",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::StorageFailure => "storage_failure",
        };
        f.write_str(s)
    }
}

/// An outbound event.
///
/// `#[serde(tag = "event", content = "data")]` yields the adjacently
/// tagged `{"event": "...", "data": {...}}` shape clients expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once to every new connection.
    ConnectSuccess,
    /// Sent to the joiner only.
    RoomJoined {
        room_code: RoomCode,
        user_id: UserId,
        is_facilitator: bool,
    },
    /// The full room snapshot.
    RoomState(Room),
    UserJoined { user: User },
    UserLeft { user_id: UserId },
    /// Announces that a vote exists. Never carries the value.
    VoteSubmitted { user_id: UserId },
    VoteCleared { user_id: UserId },
    VotesRevealed { votes: HashMap<UserId, String> },
    RoundReset { round: u32 },
    /// Sent to the removed user's connection only.
    UserKicked { user_id: UserId, kicked_by: UserId },
    UserDisconnected { user_id: UserId },
    HeartbeatAck { client_time: u64, server_time: u64 },
    Error { message: String, code: ErrorCode },
}

impl ServerEvent {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code,
        }
    }
}

/// Who receives an outbound event.
///
/// Room audiences are resolved against the session registry at send time,
/// so a connection that joined a moment ago is included and one that just
/// left is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// One connection.
    Connection(ConnectionId),
    /// Every connection bound to the room.
    Room(RoomCode),
    /// Every connection bound to the room except one, usually the sender.
    RoomExcept(RoomCode, ConnectionId),
}
