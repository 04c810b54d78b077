//! Room engine configuration.

use std::time::Duration;

use crate::codes::{ATTEMPTS_PER_LENGTH, DEFAULT_CODE_LENGTH};

/// Settings for the room engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// How long a room survives without a write. Every save restarts the
    /// clock.
    pub room_ttl: Duration,

    /// Length of freshly generated room codes.
    pub code_length: usize,

    /// Collisions tolerated at one code length before trying a longer one.
    pub attempts_per_length: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            room_ttl: Duration::from_secs(24 * 60 * 60),
            code_length: DEFAULT_CODE_LENGTH,
            attempts_per_length: ATTEMPTS_PER_LENGTH,
        }
    }
}
