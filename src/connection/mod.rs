//! Connection management: role, the monotonic state machine, and the
//! full-duplex socket wrapper.
//!
//! ## Lifecycle
//!
//! 1. **Open**: established raw stream handed in (handshake already done)
//! 2. **CloseSent** / **CloseReceived**: one side's Close frame is out
//! 3. **Closed**: terminal; transport torn down
//!
//! ## Example
//!
//! ```rust,ignore
//! use wscore::{WebSocket, Config, Role, MessageKind, CloseCode};
//!
//! let stream = tokio::net::TcpStream::connect("example.com:80").await?;
//! let mut ws = WebSocket::from_tcp(stream, Role::Client, Config::default())?;
//!
//! ws.send(b"{\"method\":\"ping\"}", MessageKind::Text, true).await?;
//!
//! let mut buf = vec![0u8; 4096];
//! let received = ws.receive(&mut buf).await;
//! if received.kind != MessageKind::Close {
//!     handle(&buf[..received.bytes_written], received.end_of_message);
//! }
//!
//! ws.close(CloseCode::Normal, "done").await?;
//! ```

mod role;
mod state;

pub use role::Role;
pub use state::SocketState;

#[cfg(feature = "async-tokio")]
mod socket;

#[cfg(feature = "async-tokio")]
pub use socket::{Received, Sender, WebSocket};
