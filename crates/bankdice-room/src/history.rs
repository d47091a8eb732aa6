//! Bounded undo history.
//!
//! Before a room applies any game action it pushes a [`Snapshot`] of its
//! players and game state. Undo pops the newest snapshot and puts it
//! back. Snapshots are plain clones of owned value types, so a snapshot
//! shares nothing with the live state it was taken from.

use std::collections::VecDeque;

use bankdice_protocol::{GameState, Player};

/// The undoable part of a room at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub players: Vec<Player>,
    pub game: GameState,
}

impl Snapshot {
    /// Deep-copies the given players and game state.
    pub fn capture(players: &[Player], game: &GameState) -> Self {
        Self {
            players: players.to_vec(),
            game: game.clone(),
        }
    }
}

/// A LIFO stack of snapshots that forgets its oldest entry once it holds
/// more than `capacity`.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl History {
    /// An empty history that keeps at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    /// Pushes a snapshot, evicting the oldest if the stack is over capacity.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Removes and returns the newest snapshot.
    pub fn pop(&mut self) -> Option<Snapshot> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every snapshot.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
