//! Room manager: creates, tracks, and routes players to rooms.

use std::collections::HashMap;

use bankdice_protocol::{GameAction, PlayerId, RoomCode, RoomSnapshot};
use rand::Rng;

use crate::game::Room;
use crate::room::spawn_room;
use crate::{PlayerSender, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Attempts at drawing a free room code before giving up.
const MAX_CODE_ATTEMPTS: usize = 64;

/// Draws a random room code. May collide with a live room; see
/// [`RoomManager::create_room`].
pub fn generate_room_code<R: Rng>(rng: &mut R) -> RoomCode {
    let alphabet = RoomCode::ALPHABET.len();
    RoomCode::from_alphabet_indices(std::array::from_fn(|_| rng.random_range(0..alphabet)))
}

/// Owns every live room and tracks which player is in which one.
///
/// This is the entry point for room operations from the server. It is a
/// plain value: the server decides where it lives and how it is shared.
pub struct RoomManager {
    /// Live rooms, keyed by code.
    rooms: HashMap<RoomCode, RoomHandle>,

    /// Maps each player to the room they're currently in.
    /// A player can be in at most ONE room at a time.
    player_rooms: HashMap<PlayerId, RoomCode>,

    config: RoomConfig,
}

impl RoomManager {
    /// Creates an empty manager whose rooms use `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a room with `player_id` as its host and only member.
    ///
    /// The code is drawn at random and redrawn if a live room already has
    /// it. The new room sends its initial state to `sender` once running.
    pub fn create_room(
        &mut self,
        player_id: PlayerId,
        name: &str,
        sender: PlayerSender,
    ) -> Result<RoomCode, RoomError> {
        self.ensure_roomless(player_id)?;

        let code = self.unique_code()?;
        let room = Room::new(code.clone(), player_id, name, self.config.clone())?;
        let handle = spawn_room(room, sender, DEFAULT_CHANNEL_SIZE);

        self.rooms.insert(code.clone(), handle);
        self.player_rooms.insert(player_id, code.clone());
        tracing::info!(room = %code, host = %player_id, "room created");
        Ok(code)
    }

    /// Adds a player to the room with `code`.
    ///
    /// Enforces the "one room at a time" invariant.
    pub async fn join_room(
        &mut self,
        player_id: PlayerId,
        code: &RoomCode,
        name: &str,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.ensure_roomless(player_id)?;

        let handle = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;

        match handle.join(player_id, name, sender).await {
            Ok(()) => {
                self.player_rooms.insert(player_id, code.clone());
                Ok(())
            }
            Err(err @ RoomError::Unavailable(_)) => {
                self.forget_room(code);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Removes a player from their current room and returns its code.
    ///
    /// The room is destroyed once its last player has left.
    pub async fn leave_room(&mut self, player_id: PlayerId) -> Result<RoomCode, RoomError> {
        let code = self
            .player_rooms
            .remove(&player_id)
            .ok_or(RoomError::NotInRoom(player_id))?;

        let Some(handle) = self.rooms.get(&code).cloned() else {
            return Ok(code);
        };

        match handle.leave(player_id).await {
            Ok(0) => self.destroy_room(&code).await?,
            Ok(_) => {}
            Err(RoomError::Unavailable(_)) => self.forget_room(&code),
            Err(err) => return Err(err),
        }
        Ok(code)
    }

    /// Routes a game action from a player to their current room.
    pub async fn route_action(
        &self,
        player_id: PlayerId,
        action: GameAction,
    ) -> Result<(), RoomError> {
        let handle = self.handle_for(player_id)?;
        handle.send_action(player_id, action).await
    }

    /// Returns info about a specific room.
    pub async fn get_room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        self.handle(code)?.get_info().await
    }

    /// Returns the full state of a specific room.
    pub async fn get_snapshot(&self, code: &RoomCode) -> Result<RoomSnapshot, RoomError> {
        self.handle(code)?.get_snapshot().await
    }

    /// Shuts down a room and removes all its players from the index.
    ///
    /// Any pending settlement dies with the room's actor.
    pub async fn destroy_room(&mut self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;

        let _ = handle.shutdown().await;
        self.player_rooms.retain(|_, c| c != code);

        tracing::info!(room = %code, "room destroyed");
        Ok(())
    }

    /// Returns the code of the room a player is currently in, if any.
    pub fn player_room(&self, player_id: PlayerId) -> Option<&RoomCode> {
        self.player_rooms.get(&player_id)
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Lists all live room codes.
    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    fn handle(&self, code: &RoomCode) -> Result<&RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))
    }

    fn handle_for(&self, player_id: PlayerId) -> Result<&RoomHandle, RoomError> {
        let code = self
            .player_rooms
            .get(&player_id)
            .ok_or(RoomError::NotInRoom(player_id))?;
        self.handle(code)
    }

    fn ensure_roomless(&self, player_id: PlayerId) -> Result<(), RoomError> {
        match self.player_rooms.get(&player_id) {
            Some(current) => Err(RoomError::AlreadyInRoom(player_id, current.clone())),
            None => Ok(()),
        }
    }

    fn unique_code(&self) -> Result<RoomCode, RoomError> {
        let mut rng = rand::rng();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code(&mut rng);
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
            tracing::debug!(room = %code, "room code collision, redrawing");
        }
        Err(RoomError::invalid("no free room codes, try again later"))
    }

    /// Drops a room whose actor has stopped on its own.
    fn forget_room(&mut self, code: &RoomCode) {
        if self.rooms.remove(code).is_some() {
            self.player_rooms.retain(|_, c| c != code);
            tracing::warn!(room = %code, "room actor gone, removed from registry");
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
