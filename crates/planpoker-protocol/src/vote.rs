//! The card deck.

/// Vote tokens a client may submit. Anything else is rejected before it
/// reaches the room engine.
pub const ALLOWED_VOTES: [&str; 10] = ["0", ".5", "1", "2", "3", "5", "8", "13", "?", "☕"];

/// Returns `true` if `vote` is one of [`ALLOWED_VOTES`]. Matching is exact.
pub fn is_allowed_vote(vote: &str) -> bool {
    ALLOWED_VOTES.contains(&vote)
}
