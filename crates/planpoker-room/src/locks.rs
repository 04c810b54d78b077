//! Per-room mutual exclusion.
//!
//! Each room code maps to its own async mutex. Holding a room's guard
//! across a load → mutate → save sequence serializes writers to that room
//! within this process; other rooms proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use planpoker_protocol::RoomCode;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held while a room is being read-modified-written. Dropping it lets the
/// next waiter in.
pub struct RoomGuard {
    room_code: RoomCode,
    _guard: OwnedMutexGuard<()>,
}

impl RoomGuard {
    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }
}

/// A registry of per-room locks.
///
/// Locks nobody holds or waits for are pruned on later acquisitions, so the
/// map does not grow with every room ever seen.
#[derive(Default)]
pub struct RoomLocks {
    locks: Mutex<HashMap<RoomCode, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `room_code`.
    pub async fn lock(&self, room_code: &RoomCode) -> RoomGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Strong count 1 means only the map holds it.
            locks.retain(|code, lock| code == room_code || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(room_code.clone()).or_default())
        };
        RoomGuard {
            room_code: room_code.clone(),
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of rooms with a lock entry. Exposed for tests and diagnostics.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
