use std::net::SocketAddr;
use std::time::Duration;

use crate::ConnectionId;

/// Everything that can go wrong between a TCP socket and a player's
/// WebSocket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The listener failed to hand over the next TCP stream.
    #[error("tcp accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The peer sent something other than a valid WebSocket upgrade.
    #[error("websocket upgrade from {peer} rejected: {reason}")]
    Upgrade { peer: SocketAddr, reason: String },

    /// The peer opened a socket but never finished the upgrade.
    #[error("{peer} did not upgrade within {within:?}")]
    UpgradeTimedOut { peer: SocketAddr, within: Duration },

    #[error("{0} is closed")]
    Closed(ConnectionId),

    #[error("writing to {id} failed: {reason}")]
    Send { id: ConnectionId, reason: String },

    #[error("reading from {id} failed: {reason}")]
    Receive { id: ConnectionId, reason: String },
}
