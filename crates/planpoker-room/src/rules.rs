//! Room transitions as pure functions.
//!
//! Nothing here touches storage or the clock; timestamps are passed in.
//! [`RoomService`](crate::RoomService) wraps each of these in a
//! load → apply → save cycle.

use chrono::{DateTime, Utc};
use planpoker_protocol::{Room, RoomPhase, User, UserId, VoteHistory};

/// How a user entered the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A fresh identity was issued.
    New,
    /// A known `user_id` was presented and reconnected.
    Rejoined,
}

/// Admits a user.
///
/// If `user_id` names a user already in the room, that user is marked
/// connected and renamed to `name`; their role and vote are untouched.
/// Otherwise a new user is created with a fresh id, and becomes facilitator
/// if the room was empty.
pub fn admit(
    room: &mut Room,
    name: &str,
    user_id: Option<&UserId>,
    now: DateTime<Utc>,
) -> (User, Admission) {
    if let Some(existing) = user_id.and_then(|id| room.users.get_mut(id)) {
        existing.connected = true;
        existing.name = name.to_string();
        return (existing.clone(), Admission::Rejoined);
    }

    let mut user = User::new(name, now);
    user.is_facilitator = room.users.is_empty();
    room.users.insert(user.id.clone(), user.clone());
    (user, Admission::New)
}

/// Removes a user, promoting a successor if the facilitator left.
///
/// Returns the removed user, or `None` if they were not in the room.
pub fn remove(room: &mut Room, user_id: &UserId) -> Option<User> {
    let removed = room.users.remove(user_id)?;
    if removed.is_facilitator {
        promote_successor(room);
    }
    Some(removed)
}

/// Ensures the room has a facilitator if it has any users.
///
/// The longest-standing user wins; ties on `joined_at` go to the smaller
/// user id. Returns the promoted user, or `None` if nobody needed
/// promoting.
pub fn promote_successor(room: &mut Room) -> Option<UserId> {
    if room.users.is_empty() || room.facilitator().is_some() {
        return None;
    }
    let successor = room
        .users
        .values()
        .min_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)))
        .map(|u| u.id.clone())?;
    if let Some(user) = room.users.get_mut(&successor) {
        user.is_facilitator = true;
    }
    Some(successor)
}

/// Sets a user's connection flag. Returns `false` if the user is absent.
pub fn set_connected(room: &mut Room, user_id: &UserId, connected: bool) -> bool {
    match room.users.get_mut(user_id) {
        Some(user) => {
            user.connected = connected;
            true
        }
        None => false,
    }
}

/// Records a vote. Refused (returns `false`) when the user is absent or
/// the room is not in [`RoomPhase::Voting`].
pub fn cast_vote(room: &mut Room, user_id: &UserId, vote: &str) -> bool {
    if room.state != RoomPhase::Voting {
        return false;
    }
    match room.users.get_mut(user_id) {
        Some(user) => {
            user.current_vote = Some(vote.to_string());
            true
        }
        None => false,
    }
}

/// Clears a user's vote in either phase. Returns `false` if the user is
/// absent.
pub fn clear_vote(room: &mut Room, user_id: &UserId) -> bool {
    match room.users.get_mut(user_id) {
        Some(user) => {
            user.current_vote = None;
            true
        }
        None => false,
    }
}

/// Flips the room to [`RoomPhase::Revealed`] and, if anyone voted,
/// appends the round's votes to the history.
///
/// Revealing twice in one round appends a second entry when votes exist.
pub fn reveal(room: &mut Room, now: DateTime<Utc>) {
    room.state = RoomPhase::Revealed;
    let votes = room.current_votes();
    if !votes.is_empty() {
        room.vote_history.push(VoteHistory {
            round: room.current_round,
            votes,
            revealed_at: now,
        });
    }
}

/// Clears every vote, reopens voting, and advances the round.
pub fn reset(room: &mut Room) {
    for user in room.users.values_mut() {
        user.current_vote = None;
    }
    room.state = RoomPhase::Voting;
    room.current_round += 1;
}
