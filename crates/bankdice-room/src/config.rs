//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by every room a [`RoomManager`](crate::RoomManager)
/// creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How many past states the host can undo through.
    pub history_depth: usize,

    /// Pause between the last player banking and the next round starting,
    /// so clients can show the fully banked board.
    pub settle_delay: Duration,

    /// Maximum players in one room.
    pub max_players: usize,

    /// Rounds a new room plays unless the host configures otherwise.
    pub default_total_rounds: u32,

    /// Player names longer than this (in characters) are truncated.
    pub max_name_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            history_depth: 10,
            settle_delay: Duration::from_secs(2),
            max_players: 8,
            default_total_rounds: 10,
            max_name_len: 24,
        }
    }
}
