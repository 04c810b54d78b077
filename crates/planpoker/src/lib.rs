//! # Planpoker
//!
//! Real-time planning poker server.
//!
//! Clients connect over WebSocket, join a room by code, and vote on
//! estimates with a fixed card deck. One participant per room is the
//! facilitator and controls reveal, reset, and removal. Rooms live in a
//! key-value [`Store`](planpoker_store::Store) with a sliding expiry, so
//! the server itself keeps only connection state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use planpoker::prelude::*;
//!
//! # async fn run() -> Result<(), PlanpokerError> {
//! let server = PlanpokerServerBuilder::new()
//!     .bind("0.0.0.0:8000")
//!     .build(MemoryStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod dispatch;
mod error;
mod handler;
pub mod health;
mod hub;
mod server;
pub mod telemetry;

pub use config::{LogFormat, ServerConfig};
pub use dispatch::{DispatchError, Dispatcher};
pub use error::PlanpokerError;
pub use hub::Inbox;
pub use server::{PlanpokerServer, PlanpokerServerBuilder};

pub mod prelude {
    pub use crate::{
        DispatchError, Dispatcher, Inbox, PlanpokerError, PlanpokerServer, PlanpokerServerBuilder,
        ServerConfig,
    };
    pub use planpoker_protocol::{
        ClientEvent, ErrorCode, Room, RoomCode, RoomPhase, ServerEvent, User, UserId,
    };
    pub use planpoker_room::{RoomConfig, RoomService};
    pub use planpoker_store::{MemoryStore, Store};
    pub use planpoker_transport::ConnectionId;
}
