//! Wire protocol for bankdice.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Envelope`], [`Payload`], [`SystemMessage`],
//!   [`GameAction`]): the messages on the wire.
//! - **Game values** ([`Player`], [`GameState`], [`DiceRoll`],
//!   [`RoomSnapshot`]): the data the room engine mutates and broadcasts.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, values out.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room (rules)
//! ```

mod codec;
mod error;
mod game;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use game::{DiceRoll, GameState, GameStatus, Player, RoomSnapshot, leaders};
pub use types::{
    Envelope, GameAction, Payload, PlayerId, Recipient, RoomCode, SystemMessage,
};
