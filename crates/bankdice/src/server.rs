//! `BankdiceServer` builder and server loop.
//!
//! This is the entry point for running a bankdice server. It ties
//! together all the layers: transport → protocol → rooms.

use std::sync::Arc;
use std::time::Duration;

use bankdice_protocol::{Codec, JsonCodec};
use bankdice_room::{RoomConfig, RoomManager};
use bankdice_transport::{Pending, Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::BankdiceError;
use crate::handler::handle_connection;

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// How long a connection may stay silent before it is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    /// Zero point for every `server_time` and envelope timestamp.
    pub(crate) started: Instant,
}

impl<C: Codec> ServerState<C> {
    /// Milliseconds since the server started.
    pub(crate) fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a bankdice server.
///
/// # Example
///
/// ```rust,ignore
/// let server = BankdiceServer::builder()
///     .bind("0.0.0.0:8080")
///     .idle_timeout(Duration::from_secs(60))
///     .build()
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Clone)]
pub struct BankdiceServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    idle_timeout: Duration,
}

impl BankdiceServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how long a connection may go without sending anything.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<BankdiceServer<JsonCodec>, BankdiceError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::new(self.room_config)),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
            started: Instant::now(),
        });

        Ok(BankdiceServer { transport, state })
    }
}

impl Default for BankdiceServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound bankdice server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BankdiceServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl BankdiceServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> BankdiceServerBuilder {
        BankdiceServerBuilder::new()
    }
}

impl<C: Codec> BankdiceServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// The loop only takes TCP peers off the listener. Each peer's
    /// WebSocket upgrade and handshake run in its own task, bounded by the
    /// idle timeout, so a peer that never speaks holds up nobody else.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), BankdiceError> {
        tracing::info!(addr = ?self.local_addr().ok(), "bankdice server running");

        loop {
            let pending = match self.transport.accept().await {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    continue;
                }
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let peer = pending.peer_addr();
                let conn = match pending.upgrade(state.idle_timeout).await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::debug!(%peer, error = %e, "peer dropped before upgrade");
                        return;
                    }
                };
                if let Err(e) = handle_connection(conn, state).await {
                    tracing::debug!(error = %e, "connection ended with error");
                }
            });
        }
    }
}
