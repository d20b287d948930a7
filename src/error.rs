//! Error types for the WebSocket transport engine.
//!
//! Errors here cover the writer's preconditions and the protocol violations
//! the reader detects. The receive path never surfaces these to callers
//! directly; the connection layer converts them into a terminal socket state
//! with a recorded close status.

use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while framing or deframing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Protocol violation detected in the inbound frame sequence.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Opcode value outside the RFC 6455 table.
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Opcode reserved for future protocol versions.
    #[error("reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// RSV bits set; no extension is ever negotiated by this engine.
    #[error("reserved bits set without a negotiated extension")]
    ReservedBitsSet,

    /// Control frame with FIN=0 (RFC 6455 §5.5).
    #[error("control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload over the 125-byte RFC limit.
    #[error("control frame payload exceeds 125 bytes")]
    ControlFrameTooLarge,

    /// Close code that must not appear in a Close frame (RFC 6455 §7.4.1).
    #[error("invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Send attempted after the connection left the Open state.
    #[error("connection closed")]
    ConnectionClosed,

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
