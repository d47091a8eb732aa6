//! Core protocol types for the bankdice wire format.
//!
//! Everything in this module travels on the wire: it is serialized by a
//! [`Codec`](crate::Codec), sent over a connection, and deserialized on
//! the other side. Game value types (players, scores, dice) live in
//! [`crate::game`]; this module holds identities, addressing, and the
//! envelope that wraps every message.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, RoomSnapshot};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of a connected player.
///
/// The server assigns one per connection during the handshake; it is the
/// only identity the game knows about. Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A four-character room code, e.g. `"K7QX"`.
///
/// Codes are drawn from [`RoomCode::ALPHABET`], which leaves out the
/// characters people confuse when reading a code aloud or off a screen
/// (`I`, `O`, `0`, `1`). Parsing is case-insensitive and trims
/// surrounding whitespace, so `" k7qx "` and `"K7QX"` name the same room.
///
/// On the wire a code is a plain JSON string. Deserializing an invalid
/// code fails the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of characters in every room code.
    pub const LEN: usize = 4;

    /// Characters a room code may contain.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Parses and normalizes a user-supplied code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] if the trimmed input is
    /// not exactly [`Self::LEN`] characters from [`Self::ALPHABET`].
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let code = raw.trim().to_ascii_uppercase();
        let valid = code.len() == Self::LEN
            && code.bytes().all(|b| Self::ALPHABET.contains(&b));
        if valid {
            Ok(Self(code))
        } else {
            Err(ProtocolError::InvalidRoomCode(raw.to_string()))
        }
    }

    /// Builds a code from alphabet positions. Positions wrap modulo the
    /// alphabet size, so any `usize` is accepted.
    pub fn from_alphabet_indices(indices: [usize; Self::LEN]) -> Self {
        let code = indices
            .iter()
            .map(|i| Self::ALPHABET[i % Self::ALPHABET.len()] as char)
            .collect();
        Self(code)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive an outbound message?
// ---------------------------------------------------------------------------

/// Addressing for messages produced by a room.
///
/// The room decides who hears about what: state updates go to
/// [`Recipient::All`], rejections go back to the one [`Recipient::Player`]
/// who sent the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every member of the room.
    All,
    /// A single member.
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// SystemMessage: connection and room plumbing
// ---------------------------------------------------------------------------

/// Framework-level messages: handshake, heartbeat, room membership, and
/// error reporting.
///
/// Internally tagged, so a message looks like
/// `{ "type": "JoinRoom", "code": "K7QX", "name": "Ada" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    // -- Connection lifecycle --
    /// Client → Server: first message on every connection.
    Handshake { version: u32 },

    /// Server → Client: the connection is accepted. `player_id` is the
    /// identity the server will use for this connection.
    HandshakeAck { player_id: PlayerId, server_time: u64 },

    /// Either direction: the sender is going away.
    Disconnect { reason: String },

    // -- Heartbeat --
    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client: echoes `client_time` so the client can measure RTT.
    HeartbeatAck { client_time: u64, server_time: u64 },

    // -- Room membership --
    /// Client → Server: open a new room with the sender as host.
    CreateRoom { name: String },

    /// Client → Server: join an existing room that has not started yet.
    JoinRoom { code: RoomCode, name: String },

    /// Client → Server: leave the current room.
    LeaveRoom,

    /// Server → Client (creator only): the room exists and you are its host.
    RoomCreated { code: RoomCode, player_id: PlayerId },

    // -- Errors --
    /// Server → Client (originating actor only): an action was rejected.
    /// `code` follows HTTP conventions (400 bad request, 403 forbidden,
    /// 404 not found, 409 conflict).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// GameAction: what players do inside a room
// ---------------------------------------------------------------------------

/// Actions a member sends to the room they are in.
///
/// Host-only actions are marked; the room rejects them from anyone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameAction {
    /// Host, waiting only: set the number of rounds.
    ConfigureRounds { total_rounds: u32 },

    /// Host, waiting only: start round 1.
    StartGame,

    /// Turn-holder: roll the dice. With both faces omitted the server
    /// rolls; with both supplied the server scores those faces.
    RollDice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        die1: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        die2: Option<u8>,
    },

    /// Turn-holder: report a roll of real dice at the table.
    SubmitPhysicalDice { value: u8, is_doubles: bool },

    /// Any member who has not banked this round: lock in the shared score.
    Bank,

    /// Host: rotate the turn, or close out a dead or fully banked round.
    AdvanceTurn,

    /// Host: roll back the last accepted action.
    Undo,
}

// ---------------------------------------------------------------------------
// Payload and Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope.
///
/// Adjacently tagged:
/// `{ "type": "Action", "data": { "type": "Bank" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Plumbing handled by the connection handler and room registry.
    System(SystemMessage),

    /// A game action routed to the sender's room.
    Action(GameAction),

    /// Server → Client: the authoritative room state after a change.
    GameStateUpdate(RoomSnapshot),
}

/// The top-level message wrapper. Every frame on the wire is one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number, starting at 0 for the handshake.
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,

    /// The message itself.
    pub payload: Payload,
}
