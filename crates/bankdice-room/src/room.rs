//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task and talks to the outside world through
//! an mpsc channel. Commands are handled one at a time, so every action
//! against a room is serialized without locks. The actor also owns the
//! room's settlement timer and runs the deferred rollover when it fires.

use std::collections::HashMap;

use bankdice_protocol::{GameAction, GameStatus, PlayerId, Recipient, RoomCode, RoomSnapshot};
use bankdice_timer::DelayTimer;
use tokio::sync::{mpsc, oneshot};

use crate::game::{Outcome, Room};
use crate::RoomError;

/// An outbound message from the room actor to a player's connection handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomOutbound {
    /// The full room state, sent after every accepted change.
    State(RoomSnapshot),
    /// A rejected action, sent only to the player who attempted it.
    Error { code: u16, message: String },
}

impl From<&RoomError> for RoomOutbound {
    fn from(err: &RoomError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Channel sender for delivering outbound messages to a player.
pub type PlayerSender = mpsc::UnboundedSender<RoomOutbound>;

/// Commands sent to a room actor through its channel.
///
/// Variants with a `reply` carry a oneshot the caller waits on.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Replies with the number of players left.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    /// A game action from a member. Rejections go back over the player's
    /// outbound channel, not a reply.
    Action {
        player_id: PlayerId,
        action: GameAction,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    GetSnapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },

    Shutdown,
}

/// A summary of room metadata (not the full game state).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub status: GameStatus,
    pub player_count: usize,
    pub max_players: usize,
    pub host_id: PlayerId,
    pub current_round: u32,
    pub total_rounds: u32,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone: it wraps an `mpsc::Sender`. The
/// [`RoomManager`](crate::RoomManager) holds one per room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Asks the room to seat a player.
    pub async fn join(
        &self,
        player_id: PlayerId,
        name: impl Into<String>,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let name = name.into();
        self.request(|reply| RoomCommand::Join {
            player_id,
            name,
            sender,
            reply,
        })
        .await?
    }

    /// Removes a player; returns how many remain.
    pub async fn leave(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    /// Sends a game action to the room (fire-and-forget).
    pub async fn send_action(
        &self,
        player_id: PlayerId,
        action: GameAction,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Action { player_id, action })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Requests the current room info.
    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Requests the full room snapshot.
    pub async fn get_snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::GetSnapshot { reply })
            .await
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room: Room,
    /// Per-player outbound channels.
    senders: HashMap<PlayerId, PlayerSender>,
    /// Pending rollover, keyed by the round it settles.
    settlement: DelayTimer<u32>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::info!(room = %self.room.code(), "room actor started");
        self.broadcast_state();

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                round = self.settlement.wait() => {
                    if self.room.settle_round(round) {
                        self.broadcast_state();
                    }
                }
            }
        }

        tracing::info!(room = %self.room.code(), "room actor stopped");
    }

    /// Handles one command. Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                player_id,
                name,
                sender,
                reply,
            } => {
                let result = self.handle_join(player_id, &name, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.handle_leave(player_id);
                let _ = reply.send(result);
            }
            RoomCommand::Action { player_id, action } => {
                self.handle_action(player_id, action);
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room = %self.room.code(), "room shutting down");
                return false;
            }
        }
        true
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        name: &str,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.room.add_player(player_id, name)?;
        self.senders.insert(player_id, sender);
        self.broadcast_state();
        Ok(())
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<usize, RoomError> {
        let departure = self.room.remove_player(player_id)?;
        self.senders.remove(&player_id);

        if departure.remaining > 0 {
            self.follow_up(departure.outcome);
            self.broadcast_state();
        }
        Ok(departure.remaining)
    }

    fn handle_action(&mut self, player_id: PlayerId, action: GameAction) {
        if !self.senders.contains_key(&player_id) {
            tracing::warn!(
                room = %self.room.code(),
                %player_id,
                "action from non-member, ignoring"
            );
            return;
        }

        let mut rng = rand::rng();
        match self.room.apply(player_id, action, &mut rng) {
            Ok(outcome) => {
                self.follow_up(outcome);
                self.broadcast_state();
            }
            Err(err) => {
                tracing::debug!(
                    room = %self.room.code(),
                    %player_id,
                    error = %err,
                    "action rejected"
                );
                self.dispatch(Recipient::Player(player_id), RoomOutbound::from(&err));
            }
        }
    }

    fn follow_up(&mut self, outcome: Outcome) {
        if let Outcome::SettlementDue { round } = outcome {
            let delay = self.room.config().settle_delay;
            tracing::debug!(room = %self.room.code(), round, ?delay, "settlement scheduled");
            self.settlement.schedule(delay, round);
        }
    }

    fn broadcast_state(&self) {
        self.dispatch(Recipient::All, RoomOutbound::State(self.room.snapshot()));
    }

    /// Delivers an outbound message to the right members.
    fn dispatch(&self, recipient: Recipient, msg: RoomOutbound) {
        match recipient {
            Recipient::All => {
                for pid in self.senders.keys() {
                    self.send_to(*pid, msg.clone());
                }
            }
            Recipient::Player(pid) => self.send_to(pid, msg),
        }
    }

    /// Sends to a single player. Silently drops if the receiver is gone
    /// (player disconnected).
    fn send_to(&self, player_id: PlayerId, msg: RoomOutbound) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    fn info(&self) -> RoomInfo {
        let game = self.room.game();
        RoomInfo {
            code: self.room.code().clone(),
            status: game.status,
            player_count: self.room.len(),
            max_players: self.room.config().max_players,
            host_id: self.room.host_id(),
            current_round: game.current_round,
            total_rounds: game.total_rounds,
        }
    }
}

/// Spawns an actor for `room`, whose single player (the host) receives
/// on `host_sender`. The actor sends the host the initial state as soon
/// as it starts.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room(room: Room, host_sender: PlayerSender, channel_size: usize) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let code = room.code().clone();

    let mut senders = HashMap::new();
    senders.insert(room.host_id(), host_sender);

    let actor = RoomActor {
        room,
        senders,
        settlement: DelayTimer::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
