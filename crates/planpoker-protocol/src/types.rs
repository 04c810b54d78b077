//! The room model.
//!
//! These types are the single representation of a room: the engine mutates
//! them, the store persists them as JSON, and `room_state` frames carry them
//! to clients unchanged.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Shortest room code accepted from a client. Generated codes start at
/// this length too.
pub const MIN_ROOM_CODE_LEN: usize = 6;

/// Longest room code accepted from a client.
pub const MAX_ROOM_CODE_LEN: usize = 32;

/// Stands in for a vote value in snapshots sent while the room is voting.
pub const HIDDEN_VOTE: &str = "hidden";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A room code such as `K7QX2M`.
///
/// Always upper case. `#[serde(transparent)]` keeps it a plain string on
/// the wire and as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalizes a client-supplied code: trims whitespace and upper-cases.
    ///
    /// Accepts [`MIN_ROOM_CODE_LEN`] to [`MAX_ROOM_CODE_LEN`] ASCII
    /// alphanumerics. Any alphanumeric is allowed, not just the
    /// generator's alphabet, so rooms can be opened under an explicit name.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidRoomCode` for short, oversized, or
    /// non-alphanumeric input.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let code = raw.trim().to_ascii_uppercase();
        let well_formed = (MIN_ROOM_CODE_LEN..=MAX_ROOM_CODE_LEN).contains(&code.len())
            && code.chars().all(|c| c.is_ascii_alphanumeric());
        if !well_formed {
            return Err(ProtocolError::InvalidRoomCode(raw.to_string()));
        }
        Ok(Self(code))
    }

    /// Wraps an already-normalized code without checking it.
    ///
    /// Intended for codes produced by the generator.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stable, opaque user identity.
///
/// Issued as a UUIDv4 string on first join. Clients keep it and present it
/// again to rejoin after a dropped connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Generates a fresh random identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Room state
// ---------------------------------------------------------------------------

/// Where a room is in its estimation round.
///
/// ```text
/// Voting ──reveal──▶ Revealed ──reset──▶ Voting (round + 1)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    /// Votes are hidden and may be submitted or cleared.
    #[default]
    Voting,
    /// Votes are visible; new votes are refused until the next reset.
    Revealed,
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voting => f.write_str("voting"),
            Self::Revealed => f.write_str("revealed"),
        }
    }
}

/// A participant in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// `false` while the user's connection is gone but they have not left.
    #[serde(default = "default_connected")]
    pub connected: bool,
    #[serde(default)]
    pub is_facilitator: bool,
    /// The hidden vote for the current round, if any.
    #[serde(default)]
    pub current_vote: Option<String>,
    pub joined_at: DateTime<Utc>,
}

fn default_connected() -> bool {
    true
}

impl User {
    /// Creates a connected, non-facilitator user with a fresh id.
    pub fn new(name: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        Self {
            id: UserId::generate(),
            name: name.into(),
            connected: true,
            is_facilitator: false,
            current_vote: None,
            joined_at,
        }
    }

    /// Returns `true` if the user holds a non-empty vote.
    pub fn has_voted(&self) -> bool {
        self.current_vote.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// The votes of one revealed round. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteHistory {
    pub round: u32,
    pub votes: HashMap<UserId, String>,
    pub revealed_at: DateTime<Utc>,
}

/// A room snapshot.
///
/// Invariants maintained by the room engine:
/// - exactly one user has `is_facilitator` while `users` is non-empty;
/// - `current_round` starts at 1 and only ever increments;
/// - every `vote_history` entry has `round <= current_round`;
/// - a room with no users is deleted rather than stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_code: RoomCode,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub state: RoomPhase,
    #[serde(default = "first_round")]
    pub current_round: u32,
    #[serde(default)]
    pub users: HashMap<UserId, User>,
    #[serde(default)]
    pub vote_history: Vec<VoteHistory>,
    /// Incremented on every save. Snapshots written before this field
    /// existed load as version 0.
    #[serde(default)]
    pub version: u64,
}

fn first_round() -> u32 {
    1
}

impl Room {
    /// Creates an empty room in round 1, voting.
    pub fn new(room_code: RoomCode, created_at: DateTime<Utc>) -> Self {
        Self {
            room_code,
            created_at,
            state: RoomPhase::Voting,
            current_round: 1,
            users: HashMap::new(),
            vote_history: Vec::new(),
            version: 0,
        }
    }

    /// Non-empty votes keyed by user.
    pub fn current_votes(&self) -> HashMap<UserId, String> {
        self.users
            .values()
            .filter_map(|u| {
                u.current_vote
                    .as_ref()
                    .filter(|v| !v.is_empty())
                    .map(|v| (u.id.clone(), v.clone()))
            })
            .collect()
    }

    pub fn facilitator(&self) -> Option<&User> {
        self.users.values().find(|u| u.is_facilitator)
    }

    /// Returns `true` if `user_id` is in the room and holds the facilitator
    /// role.
    pub fn is_facilitator(&self, user_id: &UserId) -> bool {
        self.users.get(user_id).is_some_and(|u| u.is_facilitator)
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// The snapshot as clients may see it.
    ///
    /// While voting, every cast vote reads as [`HIDDEN_VOTE`], so clients
    /// can tell who has voted but not how. Once revealed, the snapshot is
    /// returned as is.
    pub fn redacted(&self) -> Room {
        let mut room = self.clone();
        if room.state == RoomPhase::Voting {
            for user in room.users.values_mut() {
                if user.has_voted() {
                    user.current_vote = Some(HIDDEN_VOTE.to_string());
                }
            }
        }
        room
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    // =====================================================================
    // RoomCode
    // =====================================================================

    #[test]
    fn test_room_code_parse_normalizes_case_and_whitespace() {
        let code = RoomCode::parse("  test01 ").unwrap();
        assert_eq!(code.as_str(), "TEST01");
    }

    #[test]
    fn test_room_code_parse_rejects_empty() {
        assert!(RoomCode::parse("   ").is_err());
    }

    #[test]
    fn test_room_code_parse_rejects_short() {
        assert!(matches!(
            RoomCode::parse("AB"),
            Err(ProtocolError::InvalidRoomCode(_))
        ));
        assert!(RoomCode::parse(" abcde ").is_err());
        assert!(RoomCode::parse(&"A".repeat(MIN_ROOM_CODE_LEN)).is_ok());
    }

    #[test]
    fn test_room_code_parse_rejects_punctuation() {
        assert!(matches!(
            RoomCode::parse("room:ABC"),
            Err(ProtocolError::InvalidRoomCode(_))
        ));
        assert!(RoomCode::parse("AB*").is_err());
    }

    #[test]
    fn test_room_code_parse_rejects_oversized() {
        let long = "A".repeat(MAX_ROOM_CODE_LEN + 1);
        assert!(RoomCode::parse(&long).is_err());
        assert!(RoomCode::parse(&"A".repeat(MAX_ROOM_CODE_LEN)).is_ok());
    }

    // =====================================================================
    // Room::redacted
    // =====================================================================

    fn room_with_vote(state: RoomPhase) -> (Room, UserId, UserId) {
        let mut room = Room::new(RoomCode::new_unchecked("TEST01"), ts(0));
        let mut voter = User::new("Alice", ts(1));
        voter.current_vote = Some("8".into());
        let idle = User::new("Bob", ts(2));
        let (voter_id, idle_id) = (voter.id.clone(), idle.id.clone());
        room.users.insert(voter_id.clone(), voter);
        room.users.insert(idle_id.clone(), idle);
        room.state = state;
        (room, voter_id, idle_id)
    }

    #[test]
    fn test_redacted_masks_votes_while_voting() {
        let (room, voter, idle) = room_with_vote(RoomPhase::Voting);
        let public = room.redacted();
        assert_eq!(public.users[&voter].current_vote.as_deref(), Some(HIDDEN_VOTE));
        assert_eq!(public.users[&idle].current_vote, None);
        assert_eq!(room.users[&voter].current_vote.as_deref(), Some("8"));
    }

    #[test]
    fn test_redacted_keeps_votes_once_revealed() {
        let (room, _, _) = room_with_vote(RoomPhase::Revealed);
        assert_eq!(room.redacted(), room);
    }

    #[test]
    fn test_room_code_serializes_as_plain_string() {
        let json = serde_json::to_string(&RoomCode::new_unchecked("K7QX2M")).unwrap();
        assert_eq!(json, "\"K7QX2M\"");
    }

    // =====================================================================
    // UserId
    // =====================================================================

    #[test]
    fn test_user_id_generate_is_uuid() {
        let id = UserId::generate();
        assert!(uuid::Uuid::parse_str(id.as_str()).is_ok());
        assert_ne!(id, UserId::generate());
    }

    // =====================================================================
    // RoomPhase
    // =====================================================================

    #[test]
    fn test_room_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RoomPhase::Voting).unwrap(), "\"voting\"");
        assert_eq!(
            serde_json::to_string(&RoomPhase::Revealed).unwrap(),
            "\"revealed\""
        );
    }

    // =====================================================================
    // Room
    // =====================================================================

    #[test]
    fn test_room_new_starts_in_round_one_voting() {
        let room = Room::new(RoomCode::new_unchecked("ABCDEF"), ts(0));
        assert_eq!(room.state, RoomPhase::Voting);
        assert_eq!(room.current_round, 1);
        assert!(room.is_empty());
        assert!(room.vote_history.is_empty());
        assert!(room.facilitator().is_none());
    }

    #[test]
    fn test_room_current_votes_skips_empty_and_missing() {
        let mut room = Room::new(RoomCode::new_unchecked("ABCDEF"), ts(0));
        let mut a = User::new("Alice", ts(1));
        a.current_vote = Some("5".into());
        let mut b = User::new("Bob", ts(2));
        b.current_vote = Some(String::new());
        let c = User::new("Carol", ts(3));
        let a_id = a.id.clone();
        for u in [a, b, c] {
            room.users.insert(u.id.clone(), u);
        }

        let votes = room.current_votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[&a_id], "5");
    }

    #[test]
    fn test_room_json_field_names() {
        let mut room = Room::new(RoomCode::new_unchecked("ABCDEF"), ts(0));
        let mut alice = User::new("Alice", ts(0));
        alice.is_facilitator = true;
        room.users.insert(alice.id.clone(), alice.clone());

        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["room_code"], "ABCDEF");
        assert_eq!(json["state"], "voting");
        assert_eq!(json["current_round"], 1);
        assert!(json["vote_history"].as_array().unwrap().is_empty());
        let user = &json["users"][alice.id.as_str()];
        assert_eq!(user["name"], "Alice");
        assert_eq!(user["connected"], true);
        assert_eq!(user["is_facilitator"], true);
        assert!(user["current_vote"].is_null());
        assert!(user["joined_at"].is_string());
    }

    #[test]
    fn test_room_deserializes_snapshot_without_version() {
        let json = r#"{
            "room_code": "ABCD12",
            "created_at": "2025-12-20T10:00:00Z",
            "state": "revealed",
            "current_round": 3,
            "users": {
                "user_123": {
                    "id": "user_123",
                    "name": "Alice",
                    "connected": true,
                    "is_facilitator": true,
                    "current_vote": "5",
                    "joined_at": "2025-12-20T10:00:00Z"
                }
            },
            "vote_history": []
        }"#;
        let room: Room = serde_json::from_str(json).unwrap();
        assert_eq!(room.version, 0);
        assert_eq!(room.state, RoomPhase::Revealed);
        assert!(room.is_facilitator(&UserId::from("user_123")));
        assert!(!room.is_facilitator(&UserId::from("nobody")));
    }
}
