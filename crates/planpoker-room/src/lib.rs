//! Room state engine for Planpoker.
//!
//! The engine is stateless: every operation loads the room snapshot from a
//! [`Store`](planpoker_store::Store), applies one transition, and writes it
//! back with a sliding expiry. Concurrent callers in the same process
//! serialize on [`RoomLocks`].
//!
//! # Key types
//!
//! - [`RoomService`]: the load → mutate → save operations
//! - [`rules`]: the transitions themselves, as pure functions on [`Room`](planpoker_protocol::Room)
//! - [`codes`]: room code generation and validation
//! - [`RoomLocks`]: per-room async mutexes
//! - [`RoomConfig`]: expiry and code-generation settings

pub mod codes;
mod config;
mod error;
mod locks;
pub mod rules;
mod service;

pub use config::RoomConfig;
pub use error::RoomError;
pub use locks::RoomLocks;
pub use rules::Admission;
pub use service::{RoomService, room_key};
