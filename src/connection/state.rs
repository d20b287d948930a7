//! Connection state machine.

/// WebSocket connection state.
///
/// `Open → (CloseSent | CloseReceived) → Closed`, monotonic: a connection
/// never returns to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum SocketState {
    /// Data flows in both directions.
    #[default]
    Open,
    /// The local side sent a Close frame and awaits the peer's.
    CloseSent,
    /// The peer's Close frame arrived; the local echo is pending or in
    /// flight.
    CloseReceived,
    /// Terminal. The transport is torn down; no further frames move.
    Closed,
}

impl SocketState {
    /// Whether data messages may still be sent.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, SocketState::Open)
    }

    /// Whether frames may still be received.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, SocketState::Open | SocketState::CloseSent)
    }

    /// Whether this is the terminal state.
    #[must_use]
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self, SocketState::Closed)
    }

    /// Position in the monotonic lattice. `CloseSent` and `CloseReceived`
    /// share a rank: which of the two a connection passes through depends on
    /// who closed first, but neither follows the other.
    pub(crate) const fn rank(&self) -> u8 {
        match self {
            SocketState::Open => 0,
            SocketState::CloseSent | SocketState::CloseReceived => 1,
            SocketState::Closed => 2,
        }
    }
}

impl std::fmt::Display for SocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketState::Open => write!(f, "Open"),
            SocketState::CloseSent => write!(f, "CloseSent"),
            SocketState::CloseReceived => write!(f, "CloseReceived"),
            SocketState::Closed => write!(f, "Closed"),
        }
    }
}
