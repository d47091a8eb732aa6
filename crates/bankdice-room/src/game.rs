//! The room state machine: membership, round lifecycle, turns, banking,
//! and undo.
//!
//! [`Room`] is synchronous and owns no I/O. Every operation validates
//! first and mutates second, so a rejected action leaves the room exactly
//! as it was. Accepted game actions push a history snapshot immediately
//! before mutating; [`Room::apply`] with [`GameAction::Undo`] restores it.
//!
//! The one deferred transition (rolling over after everyone has banked)
//! is not run here. Operations that make it due return
//! [`Outcome::SettlementDue`]; the owner waits out the settle delay and
//! then calls [`Room::settle_round`], which re-checks that the round is
//! still waiting to be settled.

use bankdice_protocol::{
    DiceRoll, GameAction, GameState, GameStatus, Player, PlayerId, RoomCode, RoomSnapshot,
    leaders,
};
use rand::Rng;

use crate::history::{History, Snapshot};
use crate::rules::{self, OPENING_ROLLS, RollEffect};
use crate::{RoomConfig, RoomError};

/// What an accepted operation asks of the room's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed; broadcast it.
    Updated,
    /// State changed and every player has banked `round`; broadcast it and
    /// call [`Room::settle_round`] after the settle delay.
    SettlementDue { round: u32 },
}

/// Result of a player leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Players still in the room. Zero means the room should be destroyed.
    pub remaining: usize,
    /// The new host, if the departing player was the host.
    pub new_host: Option<PlayerId>,
    pub outcome: Outcome,
}

/// One game room: its players, game state, and undo history.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    host_id: PlayerId,
    players: Vec<Player>,
    game: GameState,
    history: History,
    config: RoomConfig,
}

impl Room {
    /// Opens a room with `host` as its only player.
    ///
    /// # Errors
    /// [`RoomError::InvalidState`] if the name is blank.
    pub fn new(
        code: RoomCode,
        host: PlayerId,
        host_name: &str,
        config: RoomConfig,
    ) -> Result<Self, RoomError> {
        let name = clean_name(host_name, config.max_name_len)?;
        Ok(Self {
            code,
            host_id: host,
            players: vec![Player::new(host, name, 0)],
            game: GameState::new(config.default_total_rounds),
            history: History::new(config.history_depth),
            config,
        })
    }

    // -- Accessors --------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host_id(&self) -> PlayerId {
        self.host_id
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Number of actions the host can undo right now.
    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The player whose turn it is, while a game is being played.
    pub fn turn_holder(&self) -> Option<&Player> {
        match self.game.status {
            GameStatus::Playing => self.players.get(self.game.current_turn_index),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// The broadcast view of this room.
    pub fn snapshot(&self) -> RoomSnapshot {
        let winners = match self.game.status {
            GameStatus::Finished => leaders(&self.players),
            _ => Vec::new(),
        };
        RoomSnapshot {
            code: self.code.clone(),
            host_id: self.host_id,
            players: self.players.clone(),
            game: self.game.clone(),
            undo_depth: self.history.len(),
            winners,
        }
    }

    // -- Membership -------------------------------------------------------

    /// Seats a new player at the end of the table.
    ///
    /// Membership changes clear the undo history: older snapshots would
    /// bring back a player list that no longer matches the connections.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`] if the game has started, the room is
    ///   full, or the name is blank
    /// - [`RoomError::AlreadyInRoom`] if `id` is already seated
    pub fn add_player(&mut self, id: PlayerId, name: &str) -> Result<(), RoomError> {
        if !self.game.status.is_joinable() {
            return Err(RoomError::invalid("game has already started"));
        }
        if self.player(id).is_some() {
            return Err(RoomError::AlreadyInRoom(id, self.code.clone()));
        }
        if self.players.len() >= self.config.max_players {
            return Err(RoomError::invalid("room is full"));
        }
        let name = clean_name(name, self.config.max_name_len)?;

        let turn_order = self.players.len();
        self.players.push(Player::new(id, name, turn_order));
        self.history.clear();
        tracing::info!(
            room = %self.code,
            player_id = %id,
            players = self.players.len(),
            "player joined"
        );
        Ok(())
    }

    /// Removes a player, handing off the host role and the turn if needed.
    ///
    /// # Errors
    /// [`RoomError::PlayerNotFound`] if `id` is not seated.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Departure, RoomError> {
        let idx = self.seat_of(id)?;
        self.players.remove(idx);
        self.history.clear();

        tracing::info!(
            room = %self.code,
            player_id = %id,
            players = self.players.len(),
            "player left"
        );

        if self.players.is_empty() {
            return Ok(Departure {
                remaining: 0,
                new_host: None,
                outcome: Outcome::Updated,
            });
        }

        let mut new_host = None;
        if self.host_id == id {
            self.host_id = self.players[0].id;
            new_host = Some(self.host_id);
            tracing::info!(room = %self.code, host = %self.host_id, "host reassigned");
        }

        let outcome = self.repair_turn_after_departure(idx);
        Ok(Departure {
            remaining: self.players.len(),
            new_host,
            outcome,
        })
    }

    // -- Actions ----------------------------------------------------------

    /// Validates and applies one game action from `actor`.
    ///
    /// `rng` is only used when the server rolls on the player's behalf.
    ///
    /// # Errors
    /// Any [`RoomError`]; the room is unchanged when one is returned.
    pub fn apply<R: Rng>(
        &mut self,
        actor: PlayerId,
        action: GameAction,
        rng: &mut R,
    ) -> Result<Outcome, RoomError> {
        match action {
            GameAction::ConfigureRounds { total_rounds } => {
                self.configure_rounds(actor, total_rounds)
            }
            GameAction::StartGame => self.start_game(actor),
            GameAction::RollDice { die1, die2 } => {
                let roll = match (die1, die2) {
                    (None, None) => rules::roll_dice(rng),
                    (Some(d1), Some(d2)) => DiceRoll::from_faces(d1, d2).ok_or_else(|| {
                        RoomError::invalid(format!("{d1} and {d2} are not dice faces"))
                    })?,
                    _ => return Err(RoomError::invalid("supply both dice or neither")),
                };
                self.roll(actor, roll, false)
            }
            GameAction::SubmitPhysicalDice { value, is_doubles } => {
                let roll = DiceRoll::physical(value, is_doubles).ok_or_else(|| {
                    RoomError::invalid(format!(
                        "{value}{} is not a possible roll",
                        if is_doubles { " (doubles)" } else { "" }
                    ))
                })?;
                self.roll(actor, roll, true)
            }
            GameAction::Bank => self.bank(actor),
            GameAction::AdvanceTurn => self.advance_turn(actor),
            GameAction::Undo => self.undo(actor),
        }
    }

    fn configure_rounds(&mut self, actor: PlayerId, total_rounds: u32) -> Result<Outcome, RoomError> {
        self.require_host(actor, "configure rounds")?;
        if self.game.status != GameStatus::Waiting {
            return Err(RoomError::invalid(
                "rounds can only be configured before the game starts",
            ));
        }
        if total_rounds == 0 {
            return Err(RoomError::invalid("a game needs at least one round"));
        }

        self.checkpoint();
        self.game.total_rounds = total_rounds;
        Ok(Outcome::Updated)
    }

    fn start_game(&mut self, actor: PlayerId) -> Result<Outcome, RoomError> {
        self.require_host(actor, "start the game")?;
        if !self.game.status.can_transition_to(GameStatus::Playing) {
            return Err(RoomError::invalid(format!(
                "cannot start a game that is {}",
                self.game.status
            )));
        }

        self.checkpoint();
        self.game.status = GameStatus::Playing;
        tracing::info!(
            room = %self.code,
            players = self.players.len(),
            total_rounds = self.game.total_rounds,
            "game started"
        );
        self.start_round();
        Ok(Outcome::Updated)
    }

    fn roll(&mut self, actor: PlayerId, roll: DiceRoll, physical: bool) -> Result<Outcome, RoomError> {
        let seat = self.seat_of(actor)?;
        self.require_live_round()?;
        if seat != self.game.current_turn_index {
            return Err(RoomError::OutOfTurn(actor));
        }
        if self.players[seat].banked_this_round {
            return Err(RoomError::invalid("you already banked this round"));
        }

        self.checkpoint();
        if physical {
            self.players[seat].use_physical_dice = true;
        }
        let effect = rules::resolve_roll(&mut self.game, roll);
        tracing::debug!(
            room = %self.code,
            player_id = %actor,
            total = roll.total,
            doubles = roll.is_doubles,
            ?effect,
            shared = self.game.shared_round_score,
            "dice resolved"
        );

        if effect == RollEffect::RoundDeath {
            // Banked players already hold their share; the dead pot adds
            // nothing to it.
            let pot = self.game.shared_round_score;
            for p in self.players.iter_mut().filter(|p| p.banked_this_round) {
                p.locked_score = p.locked_score.saturating_add(pot);
            }
            tracing::info!(room = %self.code, round = self.game.current_round, "round died");
            return Ok(Outcome::Updated);
        }
        Ok(self.pass_turn())
    }

    fn bank(&mut self, actor: PlayerId) -> Result<Outcome, RoomError> {
        let seat = self.seat_of(actor)?;
        self.require_live_round()?;
        if self.game.roll_count < OPENING_ROLLS {
            return Err(RoomError::invalid(format!(
                "banking opens after roll {OPENING_ROLLS}"
            )));
        }
        if self.players[seat].banked_this_round {
            return Err(RoomError::invalid("you already banked this round"));
        }

        self.checkpoint();
        let pot = self.game.shared_round_score;
        let player = &mut self.players[seat];
        player.locked_score = player.locked_score.saturating_add(pot);
        player.banked_this_round = true;
        tracing::debug!(room = %self.code, player_id = %actor, pot, "player banked");

        if rules::all_banked(&self.players) {
            self.game.round_active = false;
            return Ok(Outcome::SettlementDue {
                round: self.game.current_round,
            });
        }
        if seat == self.game.current_turn_index {
            return Ok(self.pass_turn());
        }
        Ok(Outcome::Updated)
    }

    fn advance_turn(&mut self, actor: PlayerId) -> Result<Outcome, RoomError> {
        self.require_host(actor, "advance the turn")?;
        if self.game.status != GameStatus::Playing {
            return Err(RoomError::invalid(format!(
                "cannot advance a game that is {}",
                self.game.status
            )));
        }

        self.checkpoint();
        if !self.game.round_active || rules::all_banked(&self.players) {
            let pot = self.game.shared_round_score;
            for p in self.players.iter_mut().filter(|p| !p.banked_this_round) {
                p.locked_score = p.locked_score.saturating_add(pot);
            }
            self.conclude_round();
        } else {
            self.game.current_turn_index = (self.game.current_turn_index + 1) % self.players.len();
        }
        Ok(Outcome::Updated)
    }

    fn undo(&mut self, actor: PlayerId) -> Result<Outcome, RoomError> {
        self.require_host(actor, "undo")?;
        let snapshot = self
            .history
            .pop()
            .ok_or_else(|| RoomError::invalid("nothing to undo"))?;

        self.players = snapshot.players;
        self.game = snapshot.game;
        tracing::debug!(room = %self.code, depth = self.history.len(), "undo applied");
        Ok(self.pending_settlement())
    }

    /// `SettlementDue` if the current round has closed with everyone
    /// banked and is waiting to roll over.
    fn pending_settlement(&self) -> Outcome {
        let due = self.game.status == GameStatus::Playing
            && !self.game.round_active
            && !self.players.is_empty()
            && rules::all_banked(&self.players);
        if due {
            Outcome::SettlementDue {
                round: self.game.current_round,
            }
        } else {
            Outcome::Updated
        }
    }

    /// Runs the deferred rollover for `round` if it is still due.
    ///
    /// Returns `false` (and changes nothing) when the game has moved on
    /// since the settlement was scheduled: a different round, a round
    /// that is live again, someone no longer banked, or a finished game.
    pub fn settle_round(&mut self, round: u32) -> bool {
        if self.pending_settlement() != (Outcome::SettlementDue { round }) {
            tracing::debug!(
                room = %self.code,
                round,
                current_round = self.game.current_round,
                "stale settlement ignored"
            );
            return false;
        }

        self.checkpoint();
        self.conclude_round();
        true
    }

    // -- Transitions ------------------------------------------------------

    fn start_round(&mut self) {
        for p in &mut self.players {
            p.banked_this_round = false;
            p.use_physical_dice = false;
        }
        let game = &mut self.game;
        game.current_round += 1;
        game.round_active = true;
        game.shared_round_score = 0;
        game.roll_count = 0;
        game.last_roll = None;
        game.current_turn_index = (game.current_turn_index + 1) % self.players.len();
        tracing::info!(
            room = %self.code,
            round = game.current_round,
            of = game.total_rounds,
            turn = game.current_turn_index,
            "round started"
        );
    }

    fn conclude_round(&mut self) {
        if self.game.is_final_round() {
            self.finish();
        } else {
            self.start_round();
        }
    }

    fn finish(&mut self) {
        self.game.status = GameStatus::Finished;
        self.game.round_active = false;
        tracing::info!(
            room = %self.code,
            rounds = self.game.current_round,
            winners = ?leaders(&self.players),
            "game finished"
        );
    }

    /// Hands the turn to the next unbanked player, or closes the round if
    /// there is none.
    fn pass_turn(&mut self) -> Outcome {
        match rules::next_unbanked(&self.players, self.game.current_turn_index) {
            Some(next) => {
                self.game.current_turn_index = next;
                Outcome::Updated
            }
            None => {
                self.game.round_active = false;
                Outcome::SettlementDue {
                    round: self.game.current_round,
                }
            }
        }
    }

    /// Keeps the turn pointer on the same logical seat after the player at
    /// `removed` left.
    fn repair_turn_after_departure(&mut self, removed: usize) -> Outcome {
        let n = self.players.len();
        let turn = &mut self.game.current_turn_index;
        if removed < *turn {
            *turn -= 1;
        }
        *turn %= n;

        if self.game.status != GameStatus::Playing || !self.game.round_active {
            return Outcome::Updated;
        }
        if rules::all_banked(&self.players) {
            self.game.round_active = false;
            return Outcome::SettlementDue {
                round: self.game.current_round,
            };
        }
        if self.players[self.game.current_turn_index].banked_this_round {
            return self.pass_turn();
        }
        Outcome::Updated
    }

    // -- Validation helpers -----------------------------------------------

    fn checkpoint(&mut self) {
        self.history.push(Snapshot::capture(&self.players, &self.game));
    }

    fn seat_of(&self, id: PlayerId) -> Result<usize, RoomError> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .ok_or(RoomError::PlayerNotFound(id))
    }

    fn require_host(&self, actor: PlayerId, what: &'static str) -> Result<(), RoomError> {
        self.seat_of(actor)?;
        if actor != self.host_id {
            return Err(RoomError::Unauthorized(what));
        }
        Ok(())
    }

    fn require_live_round(&self) -> Result<(), RoomError> {
        match self.game.status {
            GameStatus::Waiting => Err(RoomError::invalid("game has not started")),
            GameStatus::Finished => Err(RoomError::invalid("game is finished")),
            GameStatus::Playing if !self.game.round_active => {
                Err(RoomError::invalid("round is over"))
            }
            GameStatus::Playing => Ok(()),
        }
    }
}

/// Trims a display name and caps its length.
fn clean_name(raw: &str, max_len: usize) -> Result<String, RoomError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RoomError::invalid("name must not be empty"));
    }
    Ok(trimmed.chars().take(max_len).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn code() -> RoomCode {
        RoomCode::parse("TEST").unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    /// A waiting room with players 1..=n; player 1 hosts.
    fn room_with(n: u64) -> Room {
        let mut room = Room::new(code(), pid(1), "p1", RoomConfig::default()).unwrap();
        for id in 2..=n {
            room.add_player(pid(id), &format!("p{id}")).unwrap();
        }
        room
    }

    fn act(room: &mut Room, actor: u64, action: GameAction) -> Result<Outcome, RoomError> {
        room.apply(pid(actor), action, &mut rng())
    }

    fn physical(room: &mut Room, actor: u64, value: u8, doubles: bool) -> Outcome {
        act(
            room,
            actor,
            GameAction::SubmitPhysicalDice {
                value,
                is_doubles: doubles,
            },
        )
        .unwrap()
    }

    fn turn_holder_id(room: &Room) -> u64 {
        room.turn_holder().unwrap().id.0
    }

    // =====================================================================
    // Membership
    // =====================================================================

    #[test]
    fn test_new_room_seats_host() {
        let room = room_with(1);
        assert_eq!(room.host_id(), pid(1));
        assert_eq!(room.players().len(), 1);
        assert_eq!(room.game().status, GameStatus::Waiting);
        assert_eq!(room.game().total_rounds, 10);
    }

    #[test]
    fn test_new_room_rejects_blank_name() {
        let result = Room::new(code(), pid(1), "   ", RoomConfig::default());
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    #[test]
    fn test_add_player_assigns_turn_order_and_trims_name() {
        let mut room = room_with(1);
        room.add_player(pid(9), "  Grace  ").unwrap();

        let p = room.player(pid(9)).unwrap();
        assert_eq!(p.turn_order, 1);
        assert_eq!(p.name, "Grace");
    }

    #[test]
    fn test_add_player_truncates_long_name() {
        let mut room = room_with(1);
        room.add_player(pid(2), &"x".repeat(100)).unwrap();
        assert_eq!(room.player(pid(2)).unwrap().name.chars().count(), 24);
    }

    #[test]
    fn test_add_player_rejects_duplicate() {
        let mut room = room_with(2);
        let result = room.add_player(pid(2), "again");
        assert_eq!(result, Err(RoomError::AlreadyInRoom(pid(2), code())));
    }

    #[test]
    fn test_add_player_rejects_full_room() {
        let config = RoomConfig {
            max_players: 2,
            ..RoomConfig::default()
        };
        let mut room = Room::new(code(), pid(1), "p1", config).unwrap();
        room.add_player(pid(2), "p2").unwrap();
        assert!(matches!(
            room.add_player(pid(3), "p3"),
            Err(RoomError::InvalidState(_))
        ));
    }

    #[test]
    fn test_add_player_rejected_after_start() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        assert!(matches!(
            room.add_player(pid(3), "late"),
            Err(RoomError::InvalidState(_))
        ));
        assert_eq!(room.players().len(), 2);
    }

    #[test]
    fn test_remove_host_reassigns_to_first_remaining() {
        let mut room = room_with(3);
        let departure = room.remove_player(pid(1)).unwrap();

        assert_eq!(departure.remaining, 2);
        assert_eq!(departure.new_host, Some(pid(2)));
        assert_eq!(room.host_id(), pid(2));
    }

    #[test]
    fn test_remove_last_player_empties_room() {
        let mut room = room_with(1);
        let departure = room.remove_player(pid(1)).unwrap();
        assert_eq!(departure.remaining, 0);
        assert!(room.is_empty());
    }

    #[test]
    fn test_remove_unknown_player_is_not_found() {
        let mut room = room_with(2);
        assert_eq!(
            room.remove_player(pid(7)),
            Err(RoomError::PlayerNotFound(pid(7)))
        );
    }

    #[test]
    fn test_remove_turn_holder_passes_turn_and_keeps_index_valid() {
        let mut room = room_with(3);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        // Turn starts on seat 1 (player 2).
        assert_eq!(turn_holder_id(&room), 2);

        room.remove_player(pid(2)).unwrap();
        assert_eq!(room.game().current_turn_index, 1);
        assert_eq!(turn_holder_id(&room), 3);

        room.remove_player(pid(3)).unwrap();
        assert_eq!(room.game().current_turn_index, 0);
        assert_eq!(turn_holder_id(&room), 1);
    }

    #[test]
    fn test_remove_last_unbanked_player_makes_settlement_due() {
        let mut room = room_with(3);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..3 {
            let turn = turn_holder_id(&room);
            physical(&mut room, turn, 5, false);
        }
        act(&mut room, 1, GameAction::Bank).unwrap();
        act(&mut room, 2, GameAction::Bank).unwrap();

        let departure = room.remove_player(pid(3)).unwrap();
        assert_eq!(departure.outcome, Outcome::SettlementDue { round: 1 });
        assert!(!room.game().round_active);
    }

    #[test]
    fn test_membership_change_clears_history() {
        let mut room = room_with(1);
        act(
            &mut room,
            1,
            GameAction::ConfigureRounds { total_rounds: 3 },
        )
        .unwrap();
        assert_eq!(room.undo_depth(), 1);

        room.add_player(pid(2), "p2").unwrap();
        assert_eq!(room.undo_depth(), 0);
    }

    // =====================================================================
    // Configure / start
    // =====================================================================

    #[test]
    fn test_configure_rounds_host_only() {
        let mut room = room_with(2);
        let result = act(
            &mut room,
            2,
            GameAction::ConfigureRounds { total_rounds: 3 },
        );
        assert_eq!(result, Err(RoomError::Unauthorized("configure rounds")));
        assert_eq!(room.game().total_rounds, 10);
    }

    #[test]
    fn test_configure_rounds_rejects_zero() {
        let mut room = room_with(1);
        let result = act(
            &mut room,
            1,
            GameAction::ConfigureRounds { total_rounds: 0 },
        );
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    #[test]
    fn test_configure_rounds_frozen_after_start() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        let result = act(
            &mut room,
            1,
            GameAction::ConfigureRounds { total_rounds: 3 },
        );
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
        assert_eq!(room.game().total_rounds, 10);
    }

    #[test]
    fn test_start_game_opens_round_one_after_the_first_seat() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();

        let game = room.game();
        assert_eq!(game.status, GameStatus::Playing);
        assert_eq!(game.current_round, 1);
        assert!(game.round_active);
        assert_eq!(game.current_turn_index, 1);
    }

    #[test]
    fn test_start_game_solo_player_keeps_turn() {
        let mut room = room_with(1);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        assert_eq!(room.game().current_turn_index, 0);
    }

    #[test]
    fn test_start_game_twice_is_invalid() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        let result = act(&mut room, 1, GameAction::StartGame);
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    #[test]
    fn test_start_game_by_non_host_is_unauthorized() {
        let mut room = room_with(2);
        let result = act(&mut room, 2, GameAction::StartGame);
        assert_eq!(result, Err(RoomError::Unauthorized("start the game")));
        assert_eq!(room.game().status, GameStatus::Waiting);
    }

    // =====================================================================
    // Rolling
    // =====================================================================

    #[test]
    fn test_roll_before_start_is_invalid() {
        let mut room = room_with(2);
        let result = act(&mut room, 1, GameAction::RollDice { die1: None, die2: None });
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    #[test]
    fn test_roll_out_of_turn_is_rejected_without_change() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        let before = room.snapshot();

        let result = act(&mut room, 1, GameAction::RollDice { die1: None, die2: None });

        assert_eq!(result, Err(RoomError::OutOfTurn(pid(1))));
        assert_eq!(room.snapshot(), before);
    }

    #[test]
    fn test_roll_by_stranger_is_not_found() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        let result = act(&mut room, 99, GameAction::Bank);
        assert_eq!(result, Err(RoomError::PlayerNotFound(pid(99))));
    }

    #[test]
    fn test_server_roll_advances_turn_and_counts() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();

        act(&mut room, 2, GameAction::RollDice { die1: None, die2: None }).unwrap();

        let game = room.game();
        assert_eq!(game.roll_count, 1);
        assert!(game.last_roll.is_some());
        assert!(game.shared_round_score >= 2);
        assert_eq!(turn_holder_id(&room), 1);
    }

    #[test]
    fn test_explicit_faces_are_scored() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        act(
            &mut room,
            2,
            GameAction::RollDice {
                die1: Some(3),
                die2: Some(4),
            },
        )
        .unwrap();

        assert_eq!(room.game().shared_round_score, 70);
        let last = room.game().last_roll.unwrap();
        assert_eq!((last.die1, last.die2), (Some(3), Some(4)));
    }

    #[test]
    fn test_half_specified_or_bad_faces_are_invalid() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();

        let half = act(
            &mut room,
            2,
            GameAction::RollDice {
                die1: Some(3),
                die2: None,
            },
        );
        let bad = act(
            &mut room,
            2,
            GameAction::RollDice {
                die1: Some(9),
                die2: Some(1),
            },
        );
        assert!(matches!(half, Err(RoomError::InvalidState(_))));
        assert!(matches!(bad, Err(RoomError::InvalidState(_))));
        assert_eq!(room.game().roll_count, 0);
    }

    #[test]
    fn test_physical_submission_marks_player_and_scores() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        physical(&mut room, 2, 9, false);

        assert!(room.player(pid(2)).unwrap().use_physical_dice);
        assert_eq!(room.game().shared_round_score, 9);
        let last = room.game().last_roll.unwrap();
        assert_eq!(last.die1, None);
        assert_eq!(last.total, 9);
    }

    #[test]
    fn test_impossible_physical_submission_is_invalid() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        let result = act(
            &mut room,
            2,
            GameAction::SubmitPhysicalDice {
                value: 13,
                is_doubles: false,
            },
        );
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    #[test]
    fn test_round_death_leaves_turn_and_blocks_further_rolls() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..3 {
            let turn = turn_holder_id(&room);
            physical(&mut room, turn, 4, false);
        }
        let turn_before = room.game().current_turn_index;
        let turn = turn_holder_id(&room);
        physical(&mut room, turn, 7, false);

        assert!(!room.game().round_active);
        assert_eq!(room.game().shared_round_score, 0);
        assert_eq!(room.game().current_turn_index, turn_before);

        let again = act(
            &mut room,
            turn,
            GameAction::SubmitPhysicalDice {
                value: 5,
                is_doubles: false,
            },
        );
        assert!(matches!(again, Err(RoomError::InvalidState(_))));
    }

    // =====================================================================
    // Banking
    // =====================================================================

    #[test]
    fn test_bank_before_third_roll_is_invalid() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        physical(&mut room, 2, 5, false);
        physical(&mut room, 1, 5, false);

        let result = act(&mut room, 2, GameAction::Bank);
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
        assert!(!room.player(pid(2)).unwrap().banked_this_round);
    }

    #[test]
    fn test_bank_out_of_turn_is_allowed_and_keeps_turn() {
        let mut room = room_with(3);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..3 {
            let turn = turn_holder_id(&room);
            physical(&mut room, turn, 6, false);
        }
        let turn = room.game().current_turn_index;
        let bystander = room
            .players()
            .iter()
            .enumerate()
            .find(|(i, _)| *i != turn)
            .map(|(_, p)| p.id.0)
            .unwrap();

        act(&mut room, bystander, GameAction::Bank).unwrap();

        assert_eq!(room.game().current_turn_index, turn);
        let p = room.player(pid(bystander)).unwrap();
        assert!(p.banked_this_round);
        assert_eq!(p.locked_score, 18);
    }

    #[test]
    fn test_bank_twice_is_invalid() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..3 {
            let turn = turn_holder_id(&room);
            physical(&mut room, turn, 6, false);
        }
        act(&mut room, 1, GameAction::Bank).unwrap();
        let result = act(&mut room, 1, GameAction::Bank);
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
        assert_eq!(room.player(pid(1)).unwrap().locked_score, 18);
    }

    #[test]
    fn test_turn_holder_banking_passes_turn() {
        let mut room = room_with(3);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..3 {
            let turn = turn_holder_id(&room);
            physical(&mut room, turn, 6, false);
        }
        let holder = turn_holder_id(&room);
        act(&mut room, holder, GameAction::Bank).unwrap();

        assert_ne!(turn_holder_id(&room), holder);
        assert!(!room.turn_holder().unwrap().banked_this_round);
    }

    #[test]
    fn test_last_bank_makes_settlement_due() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..3 {
            let turn = turn_holder_id(&room);
            physical(&mut room, turn, 6, false);
        }
        assert_eq!(act(&mut room, 1, GameAction::Bank), Ok(Outcome::Updated));
        assert_eq!(
            act(&mut room, 2, GameAction::Bank),
            Ok(Outcome::SettlementDue { round: 1 })
        );
        assert!(!room.game().round_active);
    }

    #[test]
    fn test_banked_players_cannot_roll() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..3 {
            let turn = turn_holder_id(&room);
            physical(&mut room, turn, 6, false);
        }
        // Manual advance does not skip banked seats, so it can hand the
        // turn back to someone who already banked.
        let holder = turn_holder_id(&room);
        act(&mut room, holder, GameAction::Bank).unwrap();
        act(&mut room, 1, GameAction::AdvanceTurn).unwrap();
        assert_eq!(turn_holder_id(&room), holder);

        let result = act(
            &mut room,
            holder,
            GameAction::SubmitPhysicalDice {
                value: 5,
                is_doubles: false,
            },
        );
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    // =====================================================================
    // Settlement
    // =====================================================================

    fn fully_banked_room(total_rounds: u32) -> Room {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::ConfigureRounds { total_rounds }).unwrap();
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..3 {
            let turn = turn_holder_id(&room);
            physical(&mut room, turn, 6, false);
        }
        act(&mut room, 1, GameAction::Bank).unwrap();
        act(&mut room, 2, GameAction::Bank).unwrap();
        room
    }

    #[test]
    fn test_settle_round_starts_next_round_and_carries_turn() {
        let mut room = fully_banked_room(3);
        let turn_before = room.game().current_turn_index;

        assert!(room.settle_round(1));

        let game = room.game();
        assert_eq!(game.current_round, 2);
        assert!(game.round_active);
        assert_eq!(game.shared_round_score, 0);
        assert_eq!(game.roll_count, 0);
        assert_eq!(game.current_turn_index, (turn_before + 1) % 2);
        assert!(room.players().iter().all(|p| !p.banked_this_round));
        assert!(room.players().iter().all(|p| p.locked_score == 18));
    }

    #[test]
    fn test_settle_final_round_finishes_game() {
        let mut room = fully_banked_room(1);
        assert!(room.settle_round(1));
        assert_eq!(room.game().status, GameStatus::Finished);
        assert_eq!(room.snapshot().winners, vec![pid(1), pid(2)]);
    }

    #[test]
    fn test_stale_settlement_is_ignored() {
        let mut room = fully_banked_room(3);
        act(&mut room, 1, GameAction::Undo).unwrap();
        let before = room.snapshot();

        assert!(!room.settle_round(1));
        assert_eq!(room.snapshot(), before);

        let mut room = fully_banked_room(3);
        assert!(!room.settle_round(2));
    }

    #[test]
    fn test_settlement_after_manual_advance_is_ignored() {
        let mut room = fully_banked_room(3);
        act(&mut room, 1, GameAction::AdvanceTurn).unwrap();
        assert_eq!(room.game().current_round, 2);

        assert!(!room.settle_round(1));
        assert_eq!(room.game().current_round, 2);
    }

    // =====================================================================
    // Manual advance
    // =====================================================================

    #[test]
    fn test_advance_turn_is_raw_rotation_during_live_round() {
        let mut room = room_with(3);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        assert_eq!(room.game().current_turn_index, 1);

        act(&mut room, 1, GameAction::AdvanceTurn).unwrap();
        assert_eq!(room.game().current_turn_index, 2);
        act(&mut room, 1, GameAction::AdvanceTurn).unwrap();
        assert_eq!(room.game().current_turn_index, 0);
        assert_eq!(room.game().current_round, 1);
    }

    #[test]
    fn test_advance_turn_by_non_host_is_unauthorized_and_unchanged() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        let before = room.snapshot();

        let result = act(&mut room, 2, GameAction::AdvanceTurn);

        assert_eq!(result, Err(RoomError::Unauthorized("advance the turn")));
        assert_eq!(room.snapshot(), before);
    }

    #[test]
    fn test_advance_after_death_starts_next_round() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::ConfigureRounds { total_rounds: 2 }).unwrap();
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..3 {
            let turn = turn_holder_id(&room);
            physical(&mut room, turn, 4, false);
        }
        let turn = turn_holder_id(&room);
        physical(&mut room, turn, 7, false);

        act(&mut room, 1, GameAction::AdvanceTurn).unwrap();

        assert_eq!(room.game().current_round, 2);
        assert!(room.game().round_active);
        assert!(room.players().iter().all(|p| p.locked_score == 0));
    }

    #[test]
    fn test_advance_when_waiting_is_invalid() {
        let mut room = room_with(2);
        let result = act(&mut room, 1, GameAction::AdvanceTurn);
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    // =====================================================================
    // Undo
    // =====================================================================

    #[test]
    fn test_undo_is_strict_inverse_of_each_action() {
        let mut room = room_with(3);
        let mut rng = rng();
        let script: Vec<(u64, GameAction)> = vec![
            (1, GameAction::ConfigureRounds { total_rounds: 2 }),
            (1, GameAction::StartGame),
            (2, GameAction::SubmitPhysicalDice { value: 7, is_doubles: false }),
            (3, GameAction::RollDice { die1: Some(2), die2: Some(2) }),
            (1, GameAction::RollDice { die1: None, die2: None }),
            (3, GameAction::Bank),
            (1, GameAction::AdvanceTurn),
        ];

        for (actor, action) in script {
            let before = room.snapshot();
            room.apply(pid(actor), action.clone(), &mut rng)
                .unwrap_or_else(|e| panic!("{action:?} by {actor} failed: {e}"));

            room.apply(pid(1), GameAction::Undo, &mut rng).unwrap();
            let restored = room.snapshot();
            assert_eq!(restored.players, before.players, "players after undoing {action:?}");
            assert_eq!(restored.game, before.game, "game after undoing {action:?}");

            // Replay so the script keeps moving forward.
            room.apply(pid(actor), action, &mut rng).unwrap();
        }
    }

    #[test]
    fn test_undo_on_empty_history_is_invalid() {
        let mut room = room_with(2);
        let result = act(&mut room, 1, GameAction::Undo);
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    #[test]
    fn test_undo_by_non_host_is_unauthorized() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        let result = act(&mut room, 2, GameAction::Undo);
        assert_eq!(result, Err(RoomError::Unauthorized("undo")));
        assert_eq!(room.game().status, GameStatus::Playing);
    }

    #[test]
    fn test_undo_reverts_finish() {
        let mut room = fully_banked_room(1);
        assert!(room.settle_round(1));
        assert_eq!(room.game().status, GameStatus::Finished);

        // Back to the fully banked board, so the rollover is due again.
        assert_eq!(
            act(&mut room, 1, GameAction::Undo),
            Ok(Outcome::SettlementDue { round: 1 })
        );
        assert_eq!(room.game().status, GameStatus::Playing);
        assert!(!room.game().round_active);
    }

    #[test]
    fn test_history_never_exceeds_ten() {
        let mut room = room_with(2);
        act(&mut room, 1, GameAction::StartGame).unwrap();
        for _ in 0..25 {
            act(&mut room, 1, GameAction::AdvanceTurn).unwrap();
            assert!(room.undo_depth() <= 10);
        }
        assert_eq!(room.undo_depth(), 10);
    }

    // =====================================================================
    // Finished games
    // =====================================================================

    #[test]
    fn test_finished_game_rejects_play() {
        let mut room = fully_banked_room(1);
        room.settle_round(1);

        for (actor, action) in [
            (1, GameAction::Bank),
            (1, GameAction::RollDice { die1: None, die2: None }),
            (1, GameAction::AdvanceTurn),
            (1, GameAction::StartGame),
        ] {
            let result = act(&mut room, actor, action);
            assert!(matches!(result, Err(RoomError::InvalidState(_))));
        }
    }

    // =====================================================================
    // Invariants under a long random game
    // =====================================================================

    #[test]
    fn test_turn_index_stays_valid_through_random_play() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut room = room_with(4);
        act(&mut room, 1, GameAction::ConfigureRounds { total_rounds: 6 }).unwrap();
        act(&mut room, 1, GameAction::StartGame).unwrap();

        let mut last_round = room.game().current_round;
        let mut last_rolls = room.game().roll_count;

        for step in 0..2_000 {
            if room.game().status == GameStatus::Finished {
                break;
            }
            let choice = rng.random_range(0..10);
            let actor = match choice {
                0..=5 => room.turn_holder().map(|p| p.id).unwrap_or(pid(1)),
                6..=8 => room.players()[rng.random_range(0..room.len())].id,
                _ => pid(1),
            };
            let action = match choice {
                0..=5 => GameAction::RollDice { die1: None, die2: None },
                6..=8 => GameAction::Bank,
                _ => GameAction::AdvanceTurn,
            };
            if let Ok(Outcome::SettlementDue { round }) = room.apply(actor, action, &mut rng) {
                assert!(room.settle_round(round), "step {step}");
            }

            let game = room.game();
            if game.status == GameStatus::Playing {
                assert!(game.current_turn_index < room.len(), "step {step}");
            }
            if game.current_round == last_round {
                assert!(game.roll_count >= last_rolls, "step {step}");
            }
            last_round = game.current_round;
            last_rolls = game.roll_count;
            assert!(room.undo_depth() <= 10);
        }
    }
}
