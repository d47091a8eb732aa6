//! # bankdice
//!
//! Server for Bank, a turn-based dice game where everyone at the table
//! shares one growing pot and each player decides when to bank their
//! share before a seven wipes it out.
//!
//! The server is authoritative: clients send actions, every room applies
//! them in order under the game rules, and every member receives the
//! resulting state.
//!
//! ```text
//! WebSocket (bytes) → JsonCodec (Envelope) → RoomManager → room actor
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bankdice::prelude::*;
//!
//! # async fn run() -> Result<(), BankdiceError> {
//! let server = BankdiceServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .room_config(RoomConfig::default())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::BankdiceError;
pub use server::{BankdiceServer, BankdiceServerBuilder, DEFAULT_IDLE_TIMEOUT, PROTOCOL_VERSION};

/// Everything needed to run a server or speak its protocol.
pub mod prelude {
    pub use crate::{
        BankdiceError, BankdiceServer, BankdiceServerBuilder, DEFAULT_IDLE_TIMEOUT,
        PROTOCOL_VERSION,
    };
    pub use bankdice_protocol::{
        Codec, DiceRoll, Envelope, GameAction, GameState, GameStatus, JsonCodec, Payload, Player,
        PlayerId, RoomCode, RoomSnapshot, SystemMessage,
    };
    pub use bankdice_room::{RoomConfig, RoomError};
}
