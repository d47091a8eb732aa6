//! Rooms for bankdice: the rules, the round/turn state machine, bounded
//! undo, and the registry that owns every live room.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns one
//! [`Room`] and processes one command at a time.
//!
//! # Key types
//!
//! - [`Room`]: the synchronous state machine; validates, then mutates
//! - [`RoomManager`]: creates/destroys rooms, routes players by room code
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomConfig`]: history depth, settle delay, capacity, defaults
//! - [`RoomError`]: why an action was refused

mod config;
mod error;
mod game;
mod history;
mod manager;
mod room;
pub mod rules;

pub use config::RoomConfig;
pub use error::{ErrorKind, RoomError};
pub use game::{Departure, Outcome, Room};
pub use history::{History, Snapshot};
pub use manager::{RoomManager, generate_room_code};
pub use room::{PlayerSender, RoomHandle, RoomInfo, RoomOutbound};
