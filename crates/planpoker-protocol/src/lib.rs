//! Wire protocol for Planpoker.
//!
//! This crate defines what clients and the server exchange and what the
//! store persists:
//!
//! - **Model** ([`Room`], [`User`], [`VoteHistory`], [`RoomCode`],
//!   [`UserId`]): the room snapshot, serialized as JSON both on the wire
//!   (`room_state`) and in storage.
//! - **Events** ([`Envelope`], [`ClientEvent`], [`ServerEvent`],
//!   [`Audience`]): the `{"event": ..., "data": ...}` frames and who
//!   receives them.
//! - **Votes** ([`ALLOWED_VOTES`]): the card deck.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): frames to/from bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent) → Dispatcher → Room engine
//! ```

mod codec;
mod error;
mod events;
mod types;
mod vote;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use events::{Audience, ClientEvent, Envelope, ErrorCode, ServerEvent};
pub use types::{
    HIDDEN_VOTE, MAX_ROOM_CODE_LEN, MIN_ROOM_CODE_LEN, Room, RoomCode, RoomPhase, User, UserId,
    VoteHistory,
};
pub use vote::{ALLOWED_VOTES, is_allowed_vote};
