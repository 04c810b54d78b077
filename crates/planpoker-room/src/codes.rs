//! Room code generation and validation.
//!
//! Codes are drawn from a 32-symbol alphabet without the look-alikes `0`,
//! `O`, `1`, and `I`, so they survive being read aloud or copied by hand.

use std::future::Future;

use planpoker_protocol::RoomCode;
use rand::Rng;

/// Symbols used in generated codes.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a freshly generated code: the shortest code a client may send.
pub const DEFAULT_CODE_LENGTH: usize = planpoker_protocol::MIN_ROOM_CODE_LEN;

/// Collisions tolerated at one length before moving to the next.
pub const ATTEMPTS_PER_LENGTH: usize = 10;

/// Draws one random code of `length` symbols.
///
/// Synchronous on purpose: the thread-local RNG is not `Send` and must not
/// be held across an `.await`.
pub fn random_code(length: usize) -> RoomCode {
    let mut rng = rand::rng();
    let code: String = (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    RoomCode::new_unchecked(code)
}

/// Generates a code that `taken` reports as unused.
///
/// Tries `attempts` random codes of `length`, then `attempts` of
/// `length + 1`, and so on without bound. Returns the first error `taken`
/// produces.
pub async fn generate<F, Fut, E>(
    length: usize,
    attempts: usize,
    mut taken: F,
) -> Result<RoomCode, E>
where
    F: FnMut(RoomCode) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let attempts = attempts.max(1);
    let mut length = length.max(1);
    loop {
        for _ in 0..attempts {
            let code = random_code(length);
            if !taken(code.clone()).await? {
                return Ok(code);
            }
        }
        tracing::debug!(length, attempts, "room code space crowded, lengthening");
        length += 1;
    }
}

/// Returns `true` if `code` looks like a generated code: at least
/// [`DEFAULT_CODE_LENGTH`] symbols, all from [`CODE_ALPHABET`], compared
/// case-insensitively.
pub fn validate(code: &str) -> bool {
    code.chars().count() >= DEFAULT_CODE_LENGTH
        && code
            .chars()
            .all(|c| c.is_ascii() && CODE_ALPHABET.contains(&(c.to_ascii_uppercase() as u8)))
}
