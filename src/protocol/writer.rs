//! Frame writer (RFC 6455).
//!
//! [`FrameWriter`] serializes application messages into wire frames,
//! fragmenting payloads larger than the configured chunk size and masking in
//! client mode. Frames are encoded one at a time into a caller-supplied
//! reusable buffer so the driver can flush each frame before the next is
//! built, keeping memory bounded no matter how large the message is.

use bytes::BytesMut;

use crate::error::{Error, Result};
use crate::message::CloseCode;
use crate::protocol::OpCode;
use crate::protocol::header;
use crate::protocol::mask;
use crate::protocol::reader::MAX_CONTROL_PAYLOAD;

/// Seed for the mask generator. Falls back to system time if getrandom fails.
fn mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678)
    }
}

/// Encodes application messages into wire frames.
///
/// Owned exclusively by one connection. Tracks whether the previous write
/// call left a message open (`end_of_message = false`), in which case the
/// next call continues it with Continuation frames.
#[derive(Debug)]
pub struct FrameWriter {
    chunk_size: usize,
    mask_frames: bool,
    mask_counter: u32,
    mid_message: bool,
}

impl FrameWriter {
    /// Create a writer.
    ///
    /// `mask_frames` is true for client-side operation; `chunk_size` is the
    /// fragmentation threshold for outgoing messages.
    #[must_use]
    pub fn new(mask_frames: bool, chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            mask_frames,
            mask_counter: mask_seed(),
            mid_message: false,
        }
    }

    /// Whether a previous write left a message open.
    #[must_use]
    pub fn is_mid_message(&self) -> bool {
        self.mid_message
    }

    /// Weyl-sequence counter with an avalanche step. Masking-key randomness
    /// quality is not a security property of this layer; the seed comes from
    /// the OS and successive keys are decorrelated, which is all RFC 6455
    /// asks of a non-browser client.
    fn next_mask(&mut self) -> [u8; 4] {
        self.mask_counter = self.mask_counter.wrapping_add(0x9E37_79B9);
        let a = self.mask_counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d.to_le_bytes()
    }

    /// Start encoding one write call's worth of frames for a data message.
    ///
    /// `opcode` must be Text or Binary; when the previous call ended with
    /// `end_of_message = false` the first frame of this call is emitted as a
    /// Continuation regardless of `opcode`, matching the frame sequence of a
    /// message streamed across several calls.
    pub fn message<'w, 'p>(
        &'w mut self,
        payload: &'p [u8],
        opcode: OpCode,
        end_of_message: bool,
    ) -> FrameSequence<'w, 'p> {
        let continuing = self.mid_message;
        self.mid_message = !end_of_message;
        FrameSequence {
            writer: self,
            payload,
            opcode: if continuing {
                OpCode::Continuation
            } else {
                opcode
            },
            end_of_message,
            offset: 0,
            emitted: false,
        }
    }

    /// Encode a single unfragmented control frame into `out`.
    ///
    /// # Errors
    ///
    /// `Error::ControlFrameTooLarge` if `payload` exceeds 125 bytes; control
    /// frames must never be fragmented, so there is no fallback.
    pub fn control_frame(&mut self, out: &mut BytesMut, opcode: OpCode, payload: &[u8]) -> Result<()> {
        debug_assert!(opcode.is_control());
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(Error::ControlFrameTooLarge);
        }
        out.clear();
        self.encode_frame(out, true, opcode, payload);
        Ok(())
    }

    /// Encode a Close frame into `out`: big-endian status code followed by
    /// the UTF-8 reason.
    ///
    /// # Errors
    ///
    /// `Error::ControlFrameTooLarge` if the reason pushes the payload over
    /// 125 bytes (reason text is limited to 123 bytes on the wire).
    pub fn close_frame(&mut self, out: &mut BytesMut, code: CloseCode, reason: &str) -> Result<()> {
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.as_u16().to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        self.control_frame(out, OpCode::Close, &payload)
    }

    fn encode_frame(&mut self, out: &mut BytesMut, fin: bool, opcode: OpCode, payload: &[u8]) {
        let key = if self.mask_frames {
            Some(self.next_mask())
        } else {
            None
        };
        let mut head = [0u8; header::MAX_HEADER_LEN];
        let head_len = header::pack_header(&mut head, fin, opcode, key, payload.len());

        out.reserve(head_len + payload.len());
        out.extend_from_slice(&head[..head_len]);
        let body_start = out.len();
        out.extend_from_slice(payload);
        if let Some(key) = key {
            mask::apply_mask(&mut out[body_start..], key);
        }
    }
}

/// The frames of one write call, produced one at a time.
///
/// First frame: the real opcode (or Continuation when continuing a prior
/// call). Middles: Continuation with fin=0. Last: fin equal to the call's
/// `end_of_message`. An empty payload still produces exactly one frame.
pub struct FrameSequence<'w, 'p> {
    writer: &'w mut FrameWriter,
    payload: &'p [u8],
    opcode: OpCode,
    end_of_message: bool,
    offset: usize,
    emitted: bool,
}

impl FrameSequence<'_, '_> {
    /// Encode the next wire frame into `out` (cleared first). Returns false
    /// once the message has been fully encoded.
    pub fn next_frame(&mut self, out: &mut BytesMut) -> bool {
        if self.offset >= self.payload.len() {
            if self.emitted {
                return false;
            }
            self.emitted = true;
            out.clear();
            self.writer
                .encode_frame(out, self.end_of_message, self.opcode, &[]);
            return true;
        }

        let remaining = self.payload.len() - self.offset;
        let n = remaining.min(self.writer.chunk_size);
        let is_last = self.offset + n >= self.payload.len();
        let opcode = if self.emitted {
            OpCode::Continuation
        } else {
            self.opcode
        };

        out.clear();
        self.writer.encode_frame(
            out,
            is_last && self.end_of_message,
            opcode,
            &self.payload[self.offset..self.offset + n],
        );
        self.offset += n;
        self.emitted = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_frames(writer: &mut FrameWriter, payload: &[u8], opcode: OpCode, eom: bool) -> Vec<Vec<u8>> {
        let mut seq = writer.message(payload, opcode, eom);
        let mut out = BytesMut::new();
        let mut frames = Vec::new();
        while seq.next_frame(&mut out) {
            frames.push(out.to_vec());
        }
        frames
    }

    #[test]
    fn test_single_unmasked_frame() {
        let mut writer = FrameWriter::new(false, 1024);
        let frames = collect_frames(&mut writer, b"Hello", OpCode::Text, true);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], vec![0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F]);
    }

    #[test]
    fn test_empty_payload_emits_one_frame() {
        let mut writer = FrameWriter::new(false, 1024);
        let frames = collect_frames(&mut writer, b"", OpCode::Binary, true);
        assert_eq!(frames, vec![vec![0x82, 0x00]]);
    }

    #[test]
    fn test_fragmentation_opcodes_and_fin() {
        let payload = vec![0xAB; 25];
        let mut writer = FrameWriter::new(false, 10);
        let frames = collect_frames(&mut writer, &payload, OpCode::Binary, true);
        assert_eq!(frames.len(), 3);

        // first: real opcode, fin=0
        assert_eq!(frames[0][0], 0x02);
        assert_eq!(frames[0][1], 10);
        // middle: continuation, fin=0
        assert_eq!(frames[1][0], 0x00);
        assert_eq!(frames[1][1], 10);
        // last: continuation, fin=1, 5 bytes
        assert_eq!(frames[2][0], 0x80);
        assert_eq!(frames[2][1], 5);
    }

    #[test]
    fn test_payload_equal_to_chunk_size_is_one_frame() {
        let payload = vec![0xEF; 100];
        let mut writer = FrameWriter::new(false, 100);
        let frames = collect_frames(&mut writer, &payload, OpCode::Binary, true);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], 0x82);
    }

    #[test]
    fn test_mid_message_carries_across_calls() {
        let mut writer = FrameWriter::new(false, 1024);

        let first = collect_frames(&mut writer, b"part1", OpCode::Text, false);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0][0], 0x01); // text, fin=0
        assert!(writer.is_mid_message());

        let second = collect_frames(&mut writer, b"part2", OpCode::Text, true);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0][0], 0x80); // continuation, fin=1
        assert!(!writer.is_mid_message());
    }

    #[test]
    fn test_length_encoding_boundaries() {
        let mut writer = FrameWriter::new(false, usize::MAX);
        for (len, header_len, marker) in [
            (125usize, 2usize, 125u8),
            (126, 4, 126),
            (65535, 4, 126),
            (65536, 10, 127),
        ] {
            let payload = vec![0u8; len];
            let frames = collect_frames(&mut writer, &payload, OpCode::Binary, true);
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].len(), header_len + len);
            assert_eq!(frames[0][1] & 0x7F, marker, "payload len {len}");
        }
    }

    #[test]
    fn test_masked_frame_layout() {
        let mut writer = FrameWriter::new(true, 1024);
        let frames = collect_frames(&mut writer, b"Hello", OpCode::Text, true);
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];

        assert_eq!(frame[0], 0x81);
        assert_eq!(frame[1], 0x85); // mask bit + len 5
        assert_eq!(frame.len(), 2 + 4 + 5);

        let key = [frame[2], frame[3], frame[4], frame[5]];
        let mut body = frame[6..].to_vec();
        mask::apply_mask(&mut body, key);
        assert_eq!(body, b"Hello");
    }

    #[test]
    fn test_masked_frames_use_fresh_keys() {
        let mut writer = FrameWriter::new(true, 4);
        let frames = collect_frames(&mut writer, &[0u8; 12], OpCode::Binary, true);
        assert_eq!(frames.len(), 3);

        let keys: Vec<[u8; 4]> = frames
            .iter()
            .map(|f| [f[2], f[3], f[4], f[5]])
            .collect();
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
    }

    #[test]
    fn test_close_frame_layout() {
        let mut writer = FrameWriter::new(false, 1024);
        let mut out = BytesMut::new();
        writer
            .close_frame(&mut out, CloseCode::Normal, "bye")
            .unwrap();

        assert_eq!(out[0], 0x88);
        assert_eq!(out[1], 5);
        assert_eq!(u16::from_be_bytes([out[2], out[3]]), 1000);
        assert_eq!(&out[4..], b"bye");
    }

    #[test]
    fn test_control_frame_rejects_oversized_payload() {
        let mut writer = FrameWriter::new(false, 1024);
        let mut out = BytesMut::new();
        let result = writer.control_frame(&mut out, OpCode::Ping, &[0u8; 126]);
        assert!(matches!(result, Err(Error::ControlFrameTooLarge)));
    }

    #[test]
    fn test_close_frame_rejects_long_reason() {
        let mut writer = FrameWriter::new(false, 1024);
        let mut out = BytesMut::new();
        let reason = "x".repeat(124);
        let result = writer.close_frame(&mut out, CloseCode::Normal, &reason);
        assert!(matches!(result, Err(Error::ControlFrameTooLarge)));
    }

    #[test]
    fn test_chunk_size_clamped_to_one() {
        let mut writer = FrameWriter::new(false, 0);
        let frames = collect_frames(&mut writer, b"ab", OpCode::Binary, true);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][1], 1);
        assert_eq!(frames[1][1], 1);
    }
}
