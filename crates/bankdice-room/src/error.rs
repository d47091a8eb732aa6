//! Error types for the room layer.

use bankdice_protocol::{PlayerId, RoomCode};

/// Errors that can occur during room operations.
///
/// None of these is fatal. The room rejects the action, leaves its state
/// untouched, and the message goes back to whoever sent it.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// The player is not a member of the room.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// A connection can be in at most one room.
    #[error("player {0} is already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// The player is not in any room.
    #[error("player {0} is not in a room")]
    NotInRoom(PlayerId),

    /// A host-only action from someone else. Carries the action, phrased
    /// to complete "only the host can ...".
    #[error("only the host can {0}")]
    Unauthorized(&'static str),

    /// The action is not legal right now (wrong status, round over,
    /// banking too early, impossible dice, ...).
    #[error("{0}")]
    InvalidState(String),

    /// A turn-holder action from someone who does not hold the turn.
    #[error("it is not {0}'s turn")]
    OutOfTurn(PlayerId),

    /// The room's actor has stopped or its command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

/// The four ways an action can be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InvalidState,
    OutOfTurn,
}

impl RoomError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }

    /// Which class of rejection this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoomNotFound(_)
            | Self::PlayerNotFound(_)
            | Self::NotInRoom(_)
            | Self::Unavailable(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::AlreadyInRoom(..) | Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::OutOfTurn(_) => ErrorKind::OutOfTurn,
        }
    }

    /// HTTP-style status code sent to the client with the message.
    pub fn code(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            _ => match self.kind() {
                ErrorKind::NotFound => 404,
                ErrorKind::Unauthorized => 403,
                ErrorKind::InvalidState | ErrorKind::OutOfTurn => 409,
            },
        }
    }
}
