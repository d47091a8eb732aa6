//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. A
//! `ProtocolError` always means the bytes or the values on the wire were
//! wrong, never that a game rule was broken.

/// Errors that can occur while encoding, decoding, or validating wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, unknown
    /// message tags, or an invalid room code inside a message.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code that is not four characters from the room alphabet.
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),

    /// The message decoded fine but breaks protocol rules, e.g. a
    /// game action sent before the handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
