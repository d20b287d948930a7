//! Full-duplex socket wrapper.
//!
//! [`WebSocket`] composes the incremental [`FrameReader`] and [`FrameWriter`]
//! over one raw duplex stream. The stream is split: the read half belongs
//! exclusively to [`receive`](WebSocket::receive), the write half (plus the
//! writer state machine) sits behind an async mutex held for the duration of
//! one logical message, so concurrent senders never interleave frames on the
//! wire.
//!
//! `receive` never returns an error. Transport failures, unexpected
//! end-of-stream, and protocol violations all resolve to a terminal
//! [`SocketState::Closed`] with a recorded [`CloseFrame`]; callers observe
//! state instead of catching errors mid-stream.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf, split};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::config::Config;
use crate::connection::{Role, SocketState};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, MessageKind};
use crate::protocol::{FrameReader, FrameWriter, OpCode, ReadEvent};

/// Result of one [`WebSocket::receive`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Bytes written into the destination buffer.
    pub bytes_written: usize,
    /// Coarse message classification. `Close` means the connection is done;
    /// inspect [`WebSocket::close_frame`] for the status.
    pub kind: MessageKind,
    /// True when this call delivered the final bytes of the message. False
    /// means the destination buffer filled first: call `receive` again with
    /// a fresh or advanced buffer.
    pub end_of_message: bool,
    /// Connection state after this call.
    pub state: SocketState,
}

struct StateCell {
    state: SocketState,
    close_frame: Option<CloseFrame>,
}

impl StateCell {
    /// Monotonic transition; regressions are ignored.
    fn advance(&mut self, next: SocketState) {
        if next.rank() > self.state.rank() {
            self.state = next;
        }
    }
}

struct SendHalf<T> {
    io: WriteHalf<T>,
    writer: FrameWriter,
    scratch: BytesMut,
}

struct Shared<T> {
    send: Mutex<SendHalf<T>>,
    cell: StdMutex<StateCell>,
}

impl<T> Shared<T> {
    fn cell(&self) -> MutexGuard<'_, StateCell> {
        // poisoned only if a holder panicked
        self.cell.lock().unwrap()
    }

    fn state(&self) -> SocketState {
        self.cell().state
    }

    fn close_frame(&self) -> Option<CloseFrame> {
        self.cell().close_frame.clone()
    }

    /// Terminal failure: record a synthetic close and move to `Closed`.
    fn fail(&self, code: CloseCode, reason: &str) {
        let mut cell = self.cell();
        cell.close_frame
            .get_or_insert_with(|| CloseFrame::new(code, reason));
        cell.advance(SocketState::Closed);
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Shared<T> {
    async fn send(&self, data: &[u8], kind: MessageKind, end_of_message: bool) -> Result<()> {
        let opcode = match kind {
            MessageKind::Text => OpCode::Text,
            MessageKind::Binary => OpCode::Binary,
            MessageKind::Close => {
                return Err(Error::ProtocolViolation(
                    "close frames are sent through close()".into(),
                ));
            }
        };

        // the lock spans every frame of this call, so concurrent senders
        // cannot interleave fragments of two messages
        let mut send = self.send.lock().await;
        if !self.state().can_send() {
            return Err(Error::ConnectionClosed);
        }

        let SendHalf { io, writer, scratch } = &mut *send;
        let mut frames = writer.message(data, opcode, end_of_message);
        while frames.next_frame(scratch) {
            if let Err(err) = write_frame(io, scratch).await {
                self.fail(CloseCode::EndpointUnavailable, &err.to_string());
                return Err(err.into());
            }
        }
        Ok(())
    }

    async fn send_pong(&self, payload: &[u8]) -> Result<()> {
        let mut send = self.send.lock().await;
        let SendHalf { io, writer, scratch } = &mut *send;
        writer.control_frame(scratch, OpCode::Pong, payload)?;
        write_frame(io, scratch).await?;
        Ok(())
    }

    async fn close(&self, code: CloseCode, reason: &str) -> Result<()> {
        if code.is_reserved() {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }

        let mut send = self.send.lock().await;
        let prior = self.state();
        match prior {
            SocketState::Open | SocketState::CloseReceived => {}
            SocketState::CloseSent | SocketState::Closed => return Ok(()),
        }

        let SendHalf { io, writer, scratch } = &mut *send;
        writer.close_frame(scratch, code, reason)?;
        if let Err(err) = write_frame(io, scratch).await {
            self.fail(CloseCode::EndpointUnavailable, &err.to_string());
            return Err(err.into());
        }
        debug!(code = code.as_u16(), reason, "close frame sent");

        if prior == SocketState::Open {
            self.cell().advance(SocketState::CloseSent);
        } else {
            // peer closed first; our frame completes the handshake
            self.cell().advance(SocketState::Closed);
            let _ = io.shutdown().await;
        }
        Ok(())
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(io: &mut W, frame: &[u8]) -> std::io::Result<()> {
    io.write_all(frame).await?;
    io.flush().await
}

/// A WebSocket connection over an established raw duplex stream.
///
/// The HTTP upgrade handshake is a precondition handled elsewhere; this type
/// starts in [`SocketState::Open`].
///
/// One task drives [`receive`](WebSocket::receive) in a loop; any number of
/// tasks send concurrently through [`Sender`] handles. Backpressure is
/// caller-driven: nothing is parsed unless `receive` is being called, and no
/// payload is buffered beyond the read buffer.
pub struct WebSocket<T> {
    read: ReadHalf<T>,
    reader: FrameReader,
    buf: BytesMut,
    read_buffer_size: usize,
    shared: Arc<Shared<T>>,
    recv_in_flight: bool,
}

impl<T: AsyncRead + AsyncWrite + Unpin> WebSocket<T> {
    /// Wrap an established duplex stream.
    pub fn new(io: T, role: Role, config: Config) -> Self {
        let (read, write) = split(io);
        Self {
            read,
            reader: FrameReader::new(),
            buf: BytesMut::with_capacity(config.read_buffer_size),
            read_buffer_size: config.read_buffer_size,
            shared: Arc::new(Shared {
                send: Mutex::new(SendHalf {
                    io: write,
                    writer: FrameWriter::new(role.must_mask(), config.write_chunk_size),
                    scratch: BytesMut::new(),
                }),
                cell: StdMutex::new(StateCell {
                    state: SocketState::Open,
                    close_frame: None,
                }),
            }),
            recv_in_flight: false,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> SocketState {
        self.shared.state()
    }

    /// The close status and reason, once the connection has one: the peer's
    /// Close frame, or the synthetic closure recorded on failure.
    pub fn close_frame(&self) -> Option<CloseFrame> {
        self.shared.close_frame()
    }

    /// A cloneable handle for sending from other tasks.
    pub fn sender(&self) -> Sender<T> {
        Sender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Send one application message (or one piece of a message streamed
    /// across calls with `end_of_message = false`). Payloads beyond the
    /// configured chunk size are fragmented on the wire.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` once the connection left `Open`; I/O errors
    /// from the transport (which also fail the connection).
    pub async fn send(&self, data: &[u8], kind: MessageKind, end_of_message: bool) -> Result<()> {
        self.shared.send(data, kind, end_of_message).await
    }

    /// Initiate (or complete) the close handshake.
    ///
    /// From `Open` this sends a Close frame and moves to `CloseSent`; the
    /// handshake completes when the peer's Close arrives in `receive`. After
    /// the peer closed first this sends the echo and tears the transport
    /// down. No-op once a local Close is already out.
    ///
    /// # Errors
    ///
    /// `Error::InvalidCloseCode` for reserved codes (1004-1006, 1015);
    /// `Error::ControlFrameTooLarge` for reasons over 123 bytes; transport
    /// I/O errors.
    pub async fn close(&self, code: CloseCode, reason: &str) -> Result<()> {
        self.shared.close(code, reason).await
    }

    /// Receive the next chunk of an application message into `dest`.
    ///
    /// Returns when a message completes, when `dest` fills
    /// (`end_of_message = false`; call again for the rest), or when the
    /// connection closes (`kind = Close`). Pings are answered automatically
    /// and never surface; Pongs are swallowed.
    ///
    /// This method never returns an error: transport failures and protocol
    /// violations resolve to `Closed` with a recorded close frame.
    ///
    /// Cancellation: dropping the returned future while a frame is partially
    /// parsed leaves state that cannot be handed to another caller; the next
    /// call detects this and fails the connection instead of resuming.
    pub async fn receive(&mut self, dest: &mut [u8]) -> Received {
        if !self.shared.state().can_receive() {
            return self.closed(0);
        }
        if self.recv_in_flight && !self.reader.is_idle() {
            debug!("previous receive cancelled mid-frame; failing connection");
            self.shared
                .fail(CloseCode::EndpointUnavailable, "receive cancelled mid-frame");
            return self.closed(0);
        }

        self.recv_in_flight = true;
        let received = self.drive(dest).await;
        self.recv_in_flight = false;
        received
    }

    async fn drive(&mut self, dest: &mut [u8]) -> Received {
        let mut filled = 0usize;

        loop {
            // drain every stage already buffered before touching the socket
            while self.buf.has_remaining() {
                let step = match self.reader.step(&self.buf, &mut dest[filled..]) {
                    Ok(step) => step,
                    Err(err) => {
                        debug!(error = %err, "protocol violation; failing connection");
                        self.shared.fail(CloseCode::ProtocolError, &err.to_string());
                        return self.closed(filled);
                    }
                };
                self.buf.advance(step.consumed);
                filled += step.written;

                match step.event {
                    None => {}
                    Some(ReadEvent::Data { kind, end_of_message }) => {
                        return Received {
                            bytes_written: filled,
                            kind,
                            end_of_message,
                            state: self.shared.state(),
                        };
                    }
                    Some(ReadEvent::Ping(payload)) => {
                        trace!(len = payload.len(), "ping received; answering");
                        if let Err(err) = self.shared.send_pong(&payload).await {
                            self.shared
                                .fail(CloseCode::EndpointUnavailable, &err.to_string());
                            return self.closed(filled);
                        }
                    }
                    Some(ReadEvent::Pong) => trace!("pong received"),
                    Some(ReadEvent::Close(frame)) => {
                        return self.finish_close(frame, filled).await;
                    }
                }
            }

            self.buf.reserve(self.read_buffer_size);
            match self.read.read_buf(&mut self.buf).await {
                Ok(0) => {
                    debug!("unexpected end of stream");
                    self.shared
                        .fail(CloseCode::EndpointUnavailable, "unexpected end of stream");
                    return self.closed(filled);
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(error = %err, "transport read failed");
                    self.shared
                        .fail(CloseCode::EndpointUnavailable, &err.to_string());
                    return self.closed(filled);
                }
            }
        }
    }

    /// Complete the close handshake after the peer's Close frame arrived.
    async fn finish_close(&mut self, frame: CloseFrame, filled: usize) -> Received {
        let prior = {
            let mut cell = self.shared.cell();
            cell.close_frame.get_or_insert_with(|| frame.clone());
            let prior = cell.state;
            cell.advance(SocketState::CloseReceived);
            prior
        };
        debug!(
            code = frame.code.as_u16(),
            reason = %frame.reason,
            "close frame received"
        );

        let mut send = self.shared.send.lock().await;
        if prior == SocketState::Open {
            // echo before tearing down; best-effort, the peer may already be
            // gone
            let SendHalf { io, writer, scratch } = &mut *send;
            if writer.close_frame(scratch, frame.code, &frame.reason).is_ok() {
                let _ = write_frame(io, scratch).await;
            }
        }
        let _ = send.io.shutdown().await;
        drop(send);

        self.shared.cell().advance(SocketState::Closed);
        Received {
            bytes_written: filled,
            kind: MessageKind::Close,
            end_of_message: true,
            state: SocketState::Closed,
        }
    }

    fn closed(&self, filled: usize) -> Received {
        Received {
            bytes_written: filled,
            kind: MessageKind::Close,
            end_of_message: true,
            state: self.shared.state(),
        }
    }
}

impl WebSocket<TcpStream> {
    /// Wrap a TCP stream, applying transport tuning: Nagle's algorithm
    /// disabled per [`Config::tcp_nodelay`] and zero linger so closing never
    /// blocks on unsent data.
    ///
    /// # Errors
    ///
    /// Socket option errors from the OS.
    pub fn from_tcp(stream: TcpStream, role: Role, config: Config) -> Result<Self> {
        stream.set_nodelay(config.tcp_nodelay)?;
        stream.set_linger(Some(Duration::ZERO))?;
        Ok(Self::new(stream, role, config))
    }
}

/// Cloneable sending handle, sharing the connection's write half and state.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Sender<T> {
    /// Current connection state.
    pub fn state(&self) -> SocketState {
        self.shared.state()
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Sender<T> {
    /// Send one application message; see [`WebSocket::send`].
    ///
    /// # Errors
    ///
    /// Same as [`WebSocket::send`].
    pub async fn send(&self, data: &[u8], kind: MessageKind, end_of_message: bool) -> Result<()> {
        self.shared.send(data, kind, end_of_message).await
    }

    /// Initiate the close handshake; see [`WebSocket::close`].
    ///
    /// # Errors
    ///
    /// Same as [`WebSocket::close`].
    pub async fn close(&self, code: CloseCode, reason: &str) -> Result<()> {
        self.shared.close(code, reason).await
    }
}
