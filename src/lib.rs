//! # wscore - Incremental WebSocket Transport Engine
//!
//! `wscore` is an RFC 6455 byte-stream framer/deframer built from first
//! principles, designed to carry request/response and event-push protocols
//! over a raw duplex stream without a platform WebSocket stack.
//!
//! ## Design
//!
//! - **Resumable frame parser**: a state machine that survives suspension at
//!   every byte boundary and streams payload into caller-supplied buffers;
//!   messages never have to fit in memory
//! - **Bounded-memory writer** with automatic fragmentation and client-side
//!   masking
//! - **Full-duplex wrapper** with serialized concurrent sends, the close
//!   handshake, and failure-as-state semantics (no errors mid-stream)
//! - **Runtime-free core**: the protocol state machines have no I/O and no
//!   async dependency; tokio integration is feature-gated
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wscore::{WebSocket, Config, Role, MessageKind};
//!
//! let mut ws = WebSocket::from_tcp(stream, Role::Client, Config::default())?;
//! ws.send(payload, MessageKind::Binary, true).await?;
//!
//! let mut buf = vec![0u8; 8192];
//! let received = ws.receive(&mut buf).await;
//! ```
//!
//! The HTTP upgrade handshake, TLS, and the protocol carried inside messages
//! are out of scope; this crate takes over once an established duplex byte
//! stream exists.

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

pub use config::Config;
pub use connection::{Role, SocketState};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, MessageKind};
pub use protocol::{FrameReader, FrameWriter, OpCode, ReadEvent, Step};

#[cfg(feature = "async-tokio")]
pub use connection::{Received, Sender, WebSocket};
