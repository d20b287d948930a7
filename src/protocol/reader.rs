//! Incremental frame reader (RFC 6455).
//!
//! [`FrameReader`] is a resumable state machine that turns an
//! arbitrarily-chunked byte stream into application message bytes written to
//! a caller-supplied destination buffer. It performs no I/O: the caller feeds
//! whatever input it has and [`step`](FrameReader::step) consumes as much as
//! it can, suspending cleanly at any byte boundary: mid-header, mid-length,
//! mid-key, or mid-payload.
//!
//! Data payload streams straight into the destination buffer (unmasked in
//! place), so a message never has to fit in memory. Control frames are
//! accumulated in a bounded side buffer and surfaced as events instead,
//! because a Close payload must be complete before it can be interpreted.

use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, MessageKind};
use crate::protocol::OpCode;
use crate::protocol::header;
use crate::protocol::mask;

/// Maximum control frame payload (RFC 6455 §5.5).
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Which header sub-field (or payload) the reader is currently accumulating.
///
/// The stage fully determines what the next input byte means; impossible
/// combinations (e.g. collecting a masking key for an unmasked frame) cannot
/// be represented because the mask stage is only ever entered when the mask
/// bit was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Expecting the FIN/opcode byte of the next frame.
    FrameStart,
    /// Expecting the mask-bit/7-bit-length byte.
    LengthStart,
    /// Accumulating a 16- or 64-bit extended length, big-endian.
    Length,
    /// Accumulating the 4-byte masking key.
    MaskKey,
    /// Copying payload bytes.
    Payload,
}

/// Bounded accumulator for control frame payloads.
#[derive(Debug)]
struct ControlBuf {
    data: [u8; MAX_CONTROL_PAYLOAD],
    len: usize,
}

impl ControlBuf {
    const fn new() -> Self {
        Self {
            data: [0; MAX_CONTROL_PAYLOAD],
            len: 0,
        }
    }

    fn clear(&mut self) {
        self.len = 0;
    }

    /// Append bytes. Length is validated against the RFC limit before any
    /// control payload byte reaches this buffer.
    fn extend(&mut self, bytes: &[u8]) {
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }
}

/// Outcome of one [`FrameReader::step`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Input bytes consumed.
    pub consumed: usize,
    /// Bytes written to the destination buffer.
    pub written: usize,
    /// Control-flow event, if this step reached one. `None` means the input
    /// was exhausted mid-stage and the caller should feed more bytes.
    pub event: Option<ReadEvent>,
}

/// An event that returns control to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// Data is ready for the caller: either the message completed
    /// (`end_of_message`) or the destination buffer filled mid-message.
    Data {
        /// Message classification from the first frame of the message.
        kind: MessageKind,
        /// True when the final frame's payload has been fully delivered.
        end_of_message: bool,
    },
    /// A complete Ping arrived; the driver should answer with a Pong
    /// carrying this payload.
    Ping(Vec<u8>),
    /// A complete Pong arrived. Nothing to do at this layer.
    Pong,
    /// A complete Close arrived, already interpreted.
    Close(CloseFrame),
}

/// Resumable RFC 6455 frame parser.
///
/// Created once per connection and mutated in place across every call; never
/// shared between connections.
#[derive(Debug)]
pub struct FrameReader {
    stage: Stage,
    fin: bool,
    opcode: OpCode,
    kind: MessageKind,
    in_message: bool,
    masked: bool,
    payload_len: u64,
    len_bytes_remaining: u8,
    mask_key: [u8; 4],
    mask_bytes_filled: u8,
    payload_consumed: u64,
    control: ControlBuf,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Create a reader positioned at a frame boundary.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stage: Stage::FrameStart,
            fin: false,
            opcode: OpCode::Continuation,
            kind: MessageKind::Binary,
            in_message: false,
            masked: false,
            payload_len: 0,
            len_bytes_remaining: 0,
            mask_key: [0; 4],
            mask_bytes_filled: 0,
            payload_consumed: 0,
            control: ControlBuf::new(),
        }
    }

    /// True when the reader sits at a frame boundary with no fragmented
    /// message in progress. A reader that is not idle holds partial state
    /// that cannot be handed to a different caller.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::FrameStart && !self.in_message
    }

    /// Advance the state machine over `input`, writing data payload into
    /// `dest`.
    ///
    /// Drains every stage that is fully satisfiable from `input` before
    /// returning, so the driver issues the minimum number of underlying
    /// reads. Returns with an event when the caller must act (data ready,
    /// destination full, or a complete control frame); returns with
    /// `event: None` once `input` is exhausted mid-stage.
    ///
    /// # Errors
    ///
    /// Protocol violations (reserved bits/opcodes, continuation sequencing,
    /// fragmented or oversized control frames, invalid 64-bit length). After
    /// an error the reader must not be resumed; the connection is expected to
    /// terminate.
    pub fn step(&mut self, input: &[u8], dest: &mut [u8]) -> Result<Step> {
        let mut consumed = 0usize;
        let mut written = 0usize;

        loop {
            match self.stage {
                Stage::FrameStart => {
                    let Some(&byte) = input.get(consumed) else { break };
                    consumed += 1;
                    let (fin, opcode) = header::unpack_frame_start(byte)?;
                    self.begin_frame(fin, opcode)?;
                }

                Stage::LengthStart => {
                    let Some(&byte) = input.get(consumed) else { break };
                    consumed += 1;
                    let (masked, len7) = header::unpack_length_start(byte);
                    if self.opcode.is_control() && u64::from(len7) > header::MAX_INLINE_LEN {
                        // 126/127 markers imply a payload over the RFC limit
                        return Err(Error::ControlFrameTooLarge);
                    }
                    self.masked = masked;
                    self.mask_bytes_filled = 0;
                    self.payload_consumed = 0;
                    let extended = header::extended_len_bytes(len7);
                    if extended == 0 {
                        self.payload_len = u64::from(len7);
                        self.enter_payload();
                    } else {
                        self.payload_len = 0;
                        self.len_bytes_remaining = extended;
                        self.stage = Stage::Length;
                    }
                }

                Stage::Length => {
                    while self.len_bytes_remaining > 0 && consumed < input.len() {
                        self.payload_len = (self.payload_len << 8) | u64::from(input[consumed]);
                        consumed += 1;
                        self.len_bytes_remaining -= 1;
                    }
                    if self.len_bytes_remaining > 0 {
                        break;
                    }
                    if self.payload_len & (1 << 63) != 0 {
                        return Err(Error::ProtocolViolation(
                            "64-bit payload length with the most significant bit set".into(),
                        ));
                    }
                    self.enter_payload();
                }

                Stage::MaskKey => {
                    while self.mask_bytes_filled < 4 && consumed < input.len() {
                        self.mask_key[usize::from(self.mask_bytes_filled)] = input[consumed];
                        consumed += 1;
                        self.mask_bytes_filled += 1;
                    }
                    if self.mask_bytes_filled < 4 {
                        break;
                    }
                    self.stage = Stage::Payload;
                }

                Stage::Payload => {
                    if self.opcode.is_control() {
                        let n = usize::try_from(self.payload_len - self.payload_consumed)
                            .unwrap_or(usize::MAX)
                            .min(input.len() - consumed);
                        self.control.extend(&input[consumed..consumed + n]);
                        consumed += n;
                        self.payload_consumed += n as u64;
                        if self.payload_consumed == self.payload_len {
                            let event = self.finish_control_frame();
                            self.stage = Stage::FrameStart;
                            return Ok(Step {
                                consumed,
                                written,
                                event: Some(event),
                            });
                        }
                        break;
                    }

                    if self.payload_consumed == self.payload_len {
                        self.stage = Stage::FrameStart;
                        if self.fin {
                            self.in_message = false;
                            return Ok(Step {
                                consumed,
                                written,
                                event: Some(ReadEvent::Data {
                                    kind: self.kind,
                                    end_of_message: true,
                                }),
                            });
                        }
                        // non-final frame done; the message continues with the
                        // next Continuation frame
                        self.in_message = true;
                        continue;
                    }
                    if written == dest.len() {
                        return Ok(Step {
                            consumed,
                            written,
                            event: Some(ReadEvent::Data {
                                kind: self.kind,
                                end_of_message: false,
                            }),
                        });
                    }
                    if consumed == input.len() {
                        break;
                    }

                    let n = (input.len() - consumed)
                        .min(dest.len() - written)
                        .min(usize::try_from(self.payload_len - self.payload_consumed)
                            .unwrap_or(usize::MAX));
                    dest[written..written + n].copy_from_slice(&input[consumed..consumed + n]);
                    if self.masked {
                        mask::apply_mask_offset(
                            &mut dest[written..written + n],
                            self.mask_key,
                            (self.payload_consumed % 4) as usize,
                        );
                    }
                    consumed += n;
                    written += n;
                    self.payload_consumed += n as u64;
                }
            }
        }

        Ok(Step {
            consumed,
            written,
            event: None,
        })
    }

    fn begin_frame(&mut self, fin: bool, opcode: OpCode) -> Result<()> {
        match opcode {
            OpCode::Continuation => {
                if !self.in_message {
                    return Err(Error::ProtocolViolation(
                        "continuation frame without a preceding fragment".into(),
                    ));
                }
            }
            OpCode::Text | OpCode::Binary => {
                if self.in_message {
                    return Err(Error::ProtocolViolation(
                        "expected a continuation frame".into(),
                    ));
                }
                self.kind = if opcode == OpCode::Text {
                    MessageKind::Text
                } else {
                    MessageKind::Binary
                };
            }
            OpCode::Close | OpCode::Ping | OpCode::Pong => {
                if !fin {
                    return Err(Error::FragmentedControlFrame);
                }
                self.control.clear();
            }
        }
        self.fin = fin;
        self.opcode = opcode;
        self.stage = Stage::LengthStart;
        Ok(())
    }

    fn enter_payload(&mut self) {
        self.stage = if self.masked {
            Stage::MaskKey
        } else {
            Stage::Payload
        };
    }

    fn finish_control_frame(&mut self) -> ReadEvent {
        if self.masked {
            mask::apply_mask(self.control.as_mut_slice(), self.mask_key);
        }
        match self.opcode {
            OpCode::Ping => ReadEvent::Ping(self.control.as_slice().to_vec()),
            OpCode::Pong => ReadEvent::Pong,
            _ => ReadEvent::Close(parse_close_payload(self.control.as_slice())),
        }
    }
}

/// Interpret a complete Close payload.
///
/// Two or more bytes: big-endian status code followed by a UTF-8 reason
/// (non-UTF-8 maps to status 1007 with an empty reason). Fewer than two
/// bytes: normal closure with an empty reason.
fn parse_close_payload(payload: &[u8]) -> CloseFrame {
    if payload.len() >= 2 {
        let code = u16::from_be_bytes([payload[0], payload[1]]);
        match std::str::from_utf8(&payload[2..]) {
            Ok(reason) => CloseFrame::new(CloseCode::from_u16(code), reason),
            Err(_) => CloseFrame::new(CloseCode::InvalidPayload, ""),
        }
    } else {
        CloseFrame::new(CloseCode::Normal, "")
    }
}
