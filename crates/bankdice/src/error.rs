//! Unified error type for the bankdice server.

use bankdice_protocol::ProtocolError;
use bankdice_room::RoomError;
use bankdice_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BankdiceError {
    /// A socket-level error (bind, accept, upgrade, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, unauthorized, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),
}
