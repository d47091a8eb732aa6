//! Player sockets for the bankdice gateway.
//!
//! Accepting a player happens in two steps. [`Transport::accept`] hands
//! over a freshly accepted TCP stream as a [`Pending`] and returns at
//! once, so the accept loop never waits on a slow peer. The server then
//! calls [`Pending::upgrade`] from the player's own task, with a deadline,
//! to get a [`Connection`] that carries encoded envelopes.
//!
//! Every upgraded connection gets a fresh [`ConnectionId`]. The server
//! uses it as the player's identity for as long as the socket lives.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of an upgraded socket. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next unused id.
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener that yields sockets which have not yet been upgraded.
pub trait Transport: Send + 'static {
    type Pending: Pending<Connection = Self::Connection>;
    type Connection: Connection;

    /// Waits for the next TCP peer. Does no protocol work of its own.
    async fn accept(&mut self) -> Result<Self::Pending, TransportError>;
}

/// An accepted socket whose upgrade has not run yet.
pub trait Pending: Send + 'static {
    type Connection: Connection;

    fn peer_addr(&self) -> SocketAddr;

    /// Runs the upgrade handshake, giving up after `within`.
    async fn upgrade(self, within: Duration) -> Result<Self::Connection, TransportError>;
}

/// An upgraded player socket carrying whole messages.
///
/// `send` and `recv` take `&self` and may be in flight at the same time
/// from one task (for example, two arms of a `select!`).
pub trait Connection: Send + Sync + 'static {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// The next message from the player, or `Ok(None)` once they have
    /// closed the socket.
    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Closing an already closed socket is not an error.
    async fn close(&self) -> Result<(), TransportError>;

    fn id(&self) -> ConnectionId;
}
