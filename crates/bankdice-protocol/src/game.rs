//! Game value types shared by the room engine and its clients.
//!
//! These are plain data: no rules live here. The room crate mutates
//! them; the protocol layer only needs to send them. Every type is
//! `Clone + Eq`, which is what the undo history relies on: a snapshot is
//! a clone, and "undo restored the old state" is an equality check.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PlayerId, RoomCode};

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a game. Strictly forward:
///
/// ```text
/// Waiting → Playing → Finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Lobby: players may join, the host may configure rounds.
    #[default]
    Waiting,
    /// Rounds are being played.
    Playing,
    /// The last round has completed. The host may still undo; every
    /// other game action is refused.
    Finished,
}

impl GameStatus {
    /// The only state this one may move to, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` follows the lifecycle.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }

    /// Returns `true` if new players may join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// DiceRoll
// ---------------------------------------------------------------------------

/// One dice outcome: two faces (when known) and their total.
///
/// Virtual rolls know both faces. Physical submissions only report the
/// total and whether it was doubles, so their faces are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub die1: Option<u8>,
    pub die2: Option<u8>,
    pub total: u8,
    pub is_doubles: bool,
}

impl DiceRoll {
    /// Smallest face on a die.
    pub const MIN_FACE: u8 = 1;
    /// Largest face on a die.
    pub const MAX_FACE: u8 = 6;
    /// Smallest total of two dice.
    pub const MIN_TOTAL: u8 = 2 * Self::MIN_FACE;
    /// Largest total of two dice.
    pub const MAX_TOTAL: u8 = 2 * Self::MAX_FACE;

    /// A roll with both faces known. `None` if either face is off the die.
    pub fn from_faces(die1: u8, die2: u8) -> Option<Self> {
        let on_die = |f: u8| (Self::MIN_FACE..=Self::MAX_FACE).contains(&f);
        if !on_die(die1) || !on_die(die2) {
            return None;
        }
        Some(Self {
            die1: Some(die1),
            die2: Some(die2),
            total: die1 + die2,
            is_doubles: die1 == die2,
        })
    }

    /// A physical-dice report. `None` if no pair of dice can show it:
    /// the total is outside 2 to 12, or doubles were claimed on an odd total.
    pub fn physical(total: u8, is_doubles: bool) -> Option<Self> {
        if !(Self::MIN_TOTAL..=Self::MAX_TOTAL).contains(&total) {
            return None;
        }
        if is_doubles && total % 2 != 0 {
            return None;
        }
        Some(Self {
            die1: None,
            die2: None,
            total,
            is_doubles,
        })
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A member of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Connection identifier; unique within the room.
    pub id: PlayerId,
    pub name: String,
    /// Everything this player has banked, across all rounds.
    pub locked_score: u64,
    /// Set when the player banks; cleared at every round start.
    pub banked_this_round: bool,
    /// Reserved. No rule sets it.
    pub eliminated: bool,
    /// Position at join time. Never renumbered.
    pub turn_order: usize,
    /// Set when the player reports physical dice; cleared at round start.
    pub use_physical_dice: bool,
}

impl Player {
    /// A fresh player with no score.
    pub fn new(id: PlayerId, name: impl Into<String>, turn_order: usize) -> Self {
        Self {
            id,
            name: name.into(),
            locked_score: 0,
            banked_this_round: false,
            eliminated: false,
            turn_order,
            use_physical_dice: false,
        }
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Round and turn bookkeeping for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub status: GameStatus,
    /// 0 before the game starts, then 1-indexed.
    pub current_round: u32,
    pub total_rounds: u32,
    /// `true` while dice may still be rolled or banked this round.
    pub round_active: bool,
    /// The pot every unbanked player stands to win this round.
    pub shared_round_score: u64,
    /// Dice actions taken this round.
    pub roll_count: u32,
    /// Index into the room's player list.
    pub current_turn_index: usize,
    pub last_roll: Option<DiceRoll>,
}

impl GameState {
    /// State of a room that has not started yet.
    pub fn new(total_rounds: u32) -> Self {
        Self {
            status: GameStatus::Waiting,
            current_round: 0,
            total_rounds,
            round_active: false,
            shared_round_score: 0,
            roll_count: 0,
            current_turn_index: 0,
            last_roll: None,
        }
    }

    /// Returns `true` once the current round is the last one.
    pub fn is_final_round(&self) -> bool {
        self.current_round >= self.total_rounds
    }
}

// ---------------------------------------------------------------------------
// RoomSnapshot
// ---------------------------------------------------------------------------

/// Everything a client needs to render a room, sent after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub players: Vec<Player>,
    pub game: GameState,
    /// How many actions the host can currently undo.
    pub undo_depth: usize,
    /// Players with the highest locked score. Empty until the game is
    /// finished.
    pub winners: Vec<PlayerId>,
}

/// Players tied for the highest `locked_score`, in seating order.
///
/// Empty for an empty slice.
pub fn leaders(players: &[Player]) -> Vec<PlayerId> {
    let Some(best) = players.iter().map(|p| p.locked_score).max() else {
        return Vec::new();
    };
    players
        .iter()
        .filter(|p| p.locked_score == best)
        .map(|p| p.id)
        .collect()
}
