//! The room engine: load → mutate → save over a [`Store`].

use chrono::Utc;
use planpoker_protocol::{Room, RoomCode, User, UserId};
use planpoker_store::Store;

use crate::rules::{self, Admission};
use crate::{RoomConfig, RoomError, codes};

const KEY_PREFIX: &str = "room:";

/// Storage key for a room: `room:<CODE>`.
pub fn room_key(room_code: &RoomCode) -> String {
    format!("{KEY_PREFIX}{room_code}")
}

/// Stateless room operations over a shared store.
///
/// Every mutating operation reads the current snapshot, applies one
/// transition from [`rules`], and writes the result back with a fresh
/// expiry of [`RoomConfig::room_ttl`]. A missing room or user yields
/// `Ok(None)`; only storage trouble is an `Err`.
///
/// The service holds no room state and takes no locks. Callers that need
/// read-modify-write atomicity across several calls hold a
/// [`RoomLocks`](crate::RoomLocks) guard around them.
pub struct RoomService<S: Store> {
    store: S,
    config: RoomConfig,
}

impl<S: Store> RoomService<S> {
    pub fn new(store: S, config: RoomConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a room.
    ///
    /// With an explicit `room_code` that already exists, returns the
    /// existing room untouched. Without one, a fresh code is generated.
    pub async fn create_room(&self, room_code: Option<RoomCode>) -> Result<Room, RoomError> {
        let room_code = match room_code {
            Some(code) => {
                if let Some(existing) = self.get_room(&code).await? {
                    tracing::debug!(%code, "room already exists");
                    return Ok(existing);
                }
                code
            }
            None => self.fresh_code().await?,
        };

        let mut room = Room::new(room_code, Utc::now());
        self.save(&mut room).await?;
        tracing::info!(room_code = %room.room_code, "room created");
        Ok(room)
    }

    /// Loads a room, or `None` if it does not exist or has expired.
    pub async fn get_room(&self, room_code: &RoomCode) -> Result<Option<Room>, RoomError> {
        let Some(json) = self.store.get(&room_key(room_code)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| RoomError::Corrupt {
                room_code: room_code.clone(),
                source,
            })
    }

    /// Adds a user, or reconnects them if `user_id` is already in the room.
    ///
    /// Returns `None` if the room does not exist.
    pub async fn add_user(
        &self,
        room_code: &RoomCode,
        name: &str,
        user_id: Option<&UserId>,
    ) -> Result<Option<(Room, User, Admission)>, RoomError> {
        let Some(mut room) = self.get_room(room_code).await? else {
            return Ok(None);
        };
        let (user, admission) = rules::admit(&mut room, name, user_id, Utc::now());
        self.save(&mut room).await?;
        match admission {
            Admission::New => tracing::info!(
                %room_code, user_id = %user.id, users = room.users.len(),
                "user joined"
            ),
            Admission::Rejoined => tracing::info!(
                %room_code, user_id = %user.id, "user rejoined"
            ),
        }
        Ok(Some((room, user, admission)))
    }

    /// Removes a user.
    ///
    /// Returns `None` if the room or user is absent, or if the room became
    /// empty and was deleted.
    pub async fn remove_user(
        &self,
        room_code: &RoomCode,
        user_id: &UserId,
    ) -> Result<Option<Room>, RoomError> {
        let Some(mut room) = self.get_room(room_code).await? else {
            return Ok(None);
        };
        if rules::remove(&mut room, user_id).is_none() {
            return Ok(None);
        }

        if room.is_empty() {
            self.store.delete(&room_key(room_code)).await?;
            tracing::info!(%room_code, "room deleted (no users)");
            return Ok(None);
        }

        self.save(&mut room).await?;
        tracing::info!(%room_code, %user_id, "user removed");
        Ok(Some(room))
    }

    /// Sets a user's `connected` flag. Returns `None` if the room or user
    /// is absent.
    pub async fn update_user_connection(
        &self,
        room_code: &RoomCode,
        user_id: &UserId,
        connected: bool,
    ) -> Result<Option<Room>, RoomError> {
        self.apply(room_code, |room| rules::set_connected(room, user_id, connected))
            .await
    }

    /// Records a vote. Returns `None` if the room or user is absent or the
    /// room is not accepting votes.
    pub async fn submit_vote(
        &self,
        room_code: &RoomCode,
        user_id: &UserId,
        vote: &str,
    ) -> Result<Option<Room>, RoomError> {
        let room = self
            .apply(room_code, |room| rules::cast_vote(room, user_id, vote))
            .await?;
        if room.is_none() {
            tracing::warn!(%room_code, %user_id, "vote refused");
        }
        Ok(room)
    }

    /// Clears a user's vote in either phase.
    pub async fn clear_vote(
        &self,
        room_code: &RoomCode,
        user_id: &UserId,
    ) -> Result<Option<Room>, RoomError> {
        self.apply(room_code, |room| rules::clear_vote(room, user_id))
            .await
    }

    /// Reveals the round's votes and records them in the history.
    pub async fn reveal_votes(&self, room_code: &RoomCode) -> Result<Option<Room>, RoomError> {
        let now = Utc::now();
        let room = self
            .apply(room_code, |room| {
                rules::reveal(room, now);
                true
            })
            .await?;
        if let Some(room) = &room {
            tracing::info!(%room_code, round = room.current_round, "votes revealed");
        }
        Ok(room)
    }

    /// Clears all votes and starts the next round.
    pub async fn reset_round(&self, room_code: &RoomCode) -> Result<Option<Room>, RoomError> {
        let room = self
            .apply(room_code, |room| {
                rules::reset(room);
                true
            })
            .await?;
        if let Some(room) = &room {
            tracing::info!(%room_code, round = room.current_round, "round reset");
        }
        Ok(room)
    }

    /// Deletes a room outright. Returns `true` if it existed.
    pub async fn delete_room(&self, room_code: &RoomCode) -> Result<bool, RoomError> {
        Ok(self.store.delete(&room_key(room_code)).await?)
    }

    /// Codes of every stored room.
    pub async fn room_codes(&self) -> Result<Vec<RoomCode>, RoomError> {
        let keys = self.store.keys(&format!("{KEY_PREFIX}*")).await?;
        Ok(keys
            .iter()
            .filter_map(|k| k.strip_prefix(KEY_PREFIX))
            .map(RoomCode::new_unchecked)
            .collect())
    }

    /// Loads, applies `mutate`, and saves if it returned `true`.
    async fn apply<F>(&self, room_code: &RoomCode, mutate: F) -> Result<Option<Room>, RoomError>
    where
        F: FnOnce(&mut Room) -> bool,
    {
        let Some(mut room) = self.get_room(room_code).await? else {
            return Ok(None);
        };
        if !mutate(&mut room) {
            return Ok(None);
        }
        self.save(&mut room).await?;
        Ok(Some(room))
    }

    async fn save(&self, room: &mut Room) -> Result<(), RoomError> {
        room.version += 1;
        let json = serde_json::to_string(room).map_err(|source| RoomError::Encode {
            room_code: room.room_code.clone(),
            source,
        })?;
        self.store
            .set(&room_key(&room.room_code), &json, Some(self.config.room_ttl))
            .await?;
        Ok(())
    }

    async fn fresh_code(&self) -> Result<RoomCode, RoomError> {
        let store = &self.store;
        codes::generate(
            self.config.code_length,
            self.config.attempts_per_length,
            |code| async move { store.exists(&room_key(&code)).await },
        )
        .await
        .map_err(RoomError::from)
    }
}
