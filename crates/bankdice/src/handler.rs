//! Per-connection handler: handshake, then message routing both ways.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version → send HandshakeAck
//!   2. Loop until close or idle timeout, waiting on either
//!      - the next envelope from the client (system message or game action)
//!      - the next message from the player's room (state or rejection)

use std::sync::Arc;

use bankdice_protocol::{
    Codec, Envelope, Payload, PlayerId, ProtocolError, SystemMessage,
};
use bankdice_room::{PlayerSender, RoomError, RoomOutbound};
use bankdice_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::BankdiceError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Drop guard that takes a player out of their room when the handler
/// exits, however it exits.
///
/// `Drop` is synchronous, so the async leave runs in a spawned task.
struct RoomGuard<C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for RoomGuard<C> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            match state.rooms.lock().await.leave_room(player_id).await {
                Ok(code) => tracing::info!(%player_id, room = %code, "left room on disconnect"),
                Err(RoomError::NotInRoom(_)) => {}
                Err(e) => tracing::debug!(%player_id, error = %e, "leave on disconnect failed"),
            }
        });
    }
}

/// Outbound half of a connection: numbers, timestamps, encodes, and sends
/// envelopes.
struct Link<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    state: &'a ServerState<C>,
    seq: u64,
}

impl<'a, C: Codec> Link<'a, C> {
    fn new(conn: &'a WebSocketConnection, state: &'a ServerState<C>) -> Self {
        Self {
            conn,
            state,
            seq: 0,
        }
    }

    async fn send(&mut self, payload: Payload) -> Result<(), BankdiceError> {
        let envelope = Envelope {
            seq: next_seq(&mut self.seq),
            timestamp: self.state.now_ms(),
            payload,
        };
        let bytes = self.state.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_system(&mut self, msg: SystemMessage) -> Result<(), BankdiceError> {
        self.send(Payload::System(msg)).await
    }

    /// Sends a SystemMessage::Error envelope to the client.
    async fn send_error(&mut self, code: u16, message: impl Into<String>) -> Result<(), BankdiceError> {
        self.send_system(SystemMessage::Error {
            code,
            message: message.into(),
        })
        .await
    }

    async fn send_room_error(&mut self, err: &RoomError) -> Result<(), BankdiceError> {
        self.send_error(err.code(), err.to_string()).await
    }

    /// Forwards a message from the player's room.
    async fn deliver(&mut self, outbound: RoomOutbound) -> Result<(), BankdiceError> {
        match outbound {
            RoomOutbound::State(snapshot) => self.send(Payload::GameStateUpdate(snapshot)).await,
            RoomOutbound::Error { code, message } => self.send_error(code, message).await,
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), BankdiceError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut link = Link::new(&conn, &state);

    // --- Step 1: Handshake ---
    let player_id = perform_handshake(&mut link).await?;
    tracing::info!(%conn_id, %player_id, "player connected");

    let _guard = RoomGuard {
        player_id,
        state: Arc::clone(&state),
    };

    // Every room this player joins delivers through this channel.
    let (room_tx, mut room_rx) = mpsc::unbounded_channel();

    // --- Step 2: Message loop ---
    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            _ = &mut idle => {
                tracing::info!(%player_id, "connection idle, closing");
                let _ = link
                    .send_system(SystemMessage::Disconnect { reason: "idle timeout".into() })
                    .await;
                break;
            }
            incoming = conn.recv() => {
                let data = match incoming {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%player_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(Instant::now() + state.idle_timeout);

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                        link.send_error(400, format!("invalid message: {e}")).await?;
                        continue;
                    }
                };

                match envelope.payload {
                    Payload::System(msg) => {
                        let should_close = handle_system_message(
                            &mut link,
                            &state,
                            player_id,
                            msg,
                            &room_tx,
                            &mut room_rx,
                        )
                        .await?;
                        if should_close {
                            break;
                        }
                    }
                    Payload::Action(action) => {
                        // Rejections by the room come back through `room_rx`.
                        let routed = state.rooms.lock().await.route_action(player_id, action).await;
                        if let Err(e) = routed {
                            link.send_room_error(&e).await?;
                        }
                    }
                    Payload::GameStateUpdate(_) => {
                        link.send_error(400, "clients cannot send game state").await?;
                    }
                }
            }
            Some(outbound) = room_rx.recv() => {
                link.deliver(outbound).await?;
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → leave room fires.
    Ok(())
}

/// Receives the Handshake, validates the version, and sends the Ack.
async fn perform_handshake<C: Codec>(link: &mut Link<'_, C>) -> Result<PlayerId, BankdiceError> {
    let timeout = link.state.idle_timeout;
    let data = match tokio::time::timeout(timeout, link.conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(invalid("connection closed before handshake"));
        }
        Ok(Err(e)) => return Err(BankdiceError::Transport(e)),
        Err(_) => return Err(invalid("handshake timed out")),
    };

    let envelope: Envelope = match link.state.codec.decode(&data) {
        Ok(env) => env,
        Err(e) => {
            link.send_error(400, format!("invalid message: {e}")).await?;
            return Err(e.into());
        }
    };

    let version = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version }) => version,
        _ => {
            link.send_error(400, "expected Handshake").await?;
            return Err(invalid("first message must be Handshake"));
        }
    };

    if version != PROTOCOL_VERSION {
        link.send_error(
            400,
            format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        let _ = link.conn.close().await;
        return Err(invalid("protocol version mismatch"));
    }

    // The connection is the identity.
    let player_id = PlayerId(link.conn.id().into_inner());
    let server_time = link.state.now_ms();
    link.send_system(SystemMessage::HandshakeAck {
        player_id,
        server_time,
    })
    .await?;

    Ok(player_id)
}

/// Handles a system message. Returns `true` if the connection should close.
async fn handle_system_message<C: Codec>(
    link: &mut Link<'_, C>,
    state: &ServerState<C>,
    player_id: PlayerId,
    msg: SystemMessage,
    room_tx: &PlayerSender,
    room_rx: &mut mpsc::UnboundedReceiver<RoomOutbound>,
) -> Result<bool, BankdiceError> {
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let server_time = state.now_ms();
            link.send_system(SystemMessage::HeartbeatAck {
                client_time,
                server_time,
            })
            .await?;
        }

        SystemMessage::CreateRoom { name } => {
            let created = state
                .rooms
                .lock()
                .await
                .create_room(player_id, &name, room_tx.clone());
            match created {
                Ok(code) => {
                    link.send_system(SystemMessage::RoomCreated { code, player_id })
                        .await?;
                }
                Err(e) => link.send_room_error(&e).await?,
            }
        }

        SystemMessage::JoinRoom { code, name } => {
            // The room broadcasts its new state to everyone, this player
            // included, so success needs no reply of its own.
            let joined = state
                .rooms
                .lock()
                .await
                .join_room(player_id, &code, &name, room_tx.clone())
                .await;
            if let Err(e) = joined {
                link.send_room_error(&e).await?;
            }
        }

        SystemMessage::LeaveRoom => {
            let left = state.rooms.lock().await.leave_room(player_id).await;
            match left {
                Ok(code) => {
                    // The room has dropped our sender, so whatever it sent
                    // is already queued. None of it may reach the client
                    // after this point.
                    let stale = discard_queued(room_rx);
                    tracing::debug!(%player_id, room = %code, stale, "left room");
                }
                Err(e) => link.send_room_error(&e).await?,
            }
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%player_id, %reason, "client disconnected");
            return Ok(true);
        }

        other => {
            tracing::debug!(%player_id, ?other, "ignoring server-only system message");
            link.send_error(400, "unexpected system message").await?;
        }
    }

    Ok(false)
}

/// Empties the room channel without delivering anything. Returns how
/// many messages were dropped.
fn discard_queued(room_rx: &mut mpsc::UnboundedReceiver<RoomOutbound>) -> usize {
    let mut dropped = 0;
    while room_rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

fn invalid(reason: &str) -> BankdiceError {
    BankdiceError::Protocol(ProtocolError::InvalidMessage(reason.into()))
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
