//! Property-based tests for the frame writer and incremental reader.
//!
//! These fuzz the encode/decode pair across payload sizes, chunk sizes,
//! masking modes, input feed sizes, and destination buffer sizes.

use bytes::BytesMut;
use proptest::prelude::*;
use wscore::MessageKind;
use wscore::protocol::{FrameReader, FrameWriter, OpCode, ReadEvent, apply_mask, apply_mask_offset};

/// Encode one message into its wire bytes.
fn encode(writer: &mut FrameWriter, payload: &[u8], opcode: OpCode, eom: bool) -> Vec<u8> {
    let mut seq = writer.message(payload, opcode, eom);
    let mut frame = BytesMut::new();
    let mut wire = Vec::new();
    while seq.next_frame(&mut frame) {
        wire.extend_from_slice(&frame);
    }
    wire
}

/// Decode one complete message, feeding the reader at most `feed` input bytes
/// at a time with a `dest_cap`-byte destination buffer.
fn decode(wire: &[u8], feed: usize, dest_cap: usize) -> (Vec<u8>, MessageKind) {
    let mut reader = FrameReader::new();
    let mut dest = vec![0u8; dest_cap.max(1)];
    let mut out = Vec::new();
    let mut at = 0;
    loop {
        let window = (at + feed.max(1)).min(wire.len());
        let step = reader.step(&wire[at..window], &mut dest).unwrap();
        at += step.consumed;
        out.extend_from_slice(&dest[..step.written]);
        match step.event {
            Some(ReadEvent::Data {
                kind,
                end_of_message: true,
            }) => return (out, kind),
            Some(_) => {}
            None => assert!(
                at < wire.len() || step.written > 0,
                "reader stalled with input exhausted"
            ),
        }
    }
}

proptest! {
    // =========================================================================
    // Property 1: encode then decode returns the original bytes (unmasked)
    // =========================================================================
    #[test]
    fn prop_roundtrip_unmasked(
        payload in prop::collection::vec(any::<u8>(), 0..2000),
        feed in 1usize..64,
        dest_cap in 1usize..256,
    ) {
        let mut writer = FrameWriter::new(false, usize::MAX);
        let wire = encode(&mut writer, &payload, OpCode::Binary, true);
        let (decoded, kind) = decode(&wire, feed, dest_cap);
        prop_assert_eq!(decoded, payload);
        prop_assert_eq!(kind, MessageKind::Binary);
    }

    // =========================================================================
    // Property 2: encode then decode with client-side masking
    // =========================================================================
    #[test]
    fn prop_roundtrip_masked(
        payload in prop::collection::vec(any::<u8>(), 0..2000),
        feed in 1usize..64,
        dest_cap in 1usize..256,
    ) {
        let mut writer = FrameWriter::new(true, usize::MAX);
        let wire = encode(&mut writer, &payload, OpCode::Text, true);
        let (decoded, kind) = decode(&wire, feed, dest_cap);
        prop_assert_eq!(decoded, payload);
        prop_assert_eq!(kind, MessageKind::Text);
    }

    // =========================================================================
    // Property 3: fragmented writes reassemble byte-identically, even when the
    // destination buffer is smaller than any single frame
    // =========================================================================
    #[test]
    fn prop_roundtrip_fragmented(
        payload in prop::collection::vec(any::<u8>(), 1..2000),
        chunk_size in 1usize..64,
        masked in any::<bool>(),
    ) {
        let mut writer = FrameWriter::new(masked, chunk_size);
        let wire = encode(&mut writer, &payload, OpCode::Binary, true);
        // destination deliberately smaller than the write chunk
        let dest_cap = (chunk_size / 2).max(1);
        let (decoded, _) = decode(&wire, wire.len(), dest_cap);
        prop_assert_eq!(decoded, payload);
    }

    // =========================================================================
    // Property 4: one-byte feeding equals single-chunk feeding
    // =========================================================================
    #[test]
    fn prop_byte_at_a_time_equivalence(
        payload in prop::collection::vec(any::<u8>(), 0..500),
        masked in any::<bool>(),
    ) {
        let mut writer = FrameWriter::new(masked, 128);
        let wire = encode(&mut writer, &payload, OpCode::Binary, true);
        let whole = decode(&wire, wire.len(), payload.len() + 1);
        let trickled = decode(&wire, 1, payload.len() + 1);
        prop_assert_eq!(whole, trickled);
    }

    // =========================================================================
    // Property 5: masking is self-inverse at every key offset
    // =========================================================================
    #[test]
    fn prop_mask_self_inverse(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        key in any::<[u8; 4]>(),
        offset in 0usize..4,
    ) {
        let mut masked = data.clone();
        apply_mask_offset(&mut masked, key, offset);
        apply_mask_offset(&mut masked, key, offset);
        prop_assert_eq!(masked, data);
    }

    // =========================================================================
    // Property 6: splitting a masked payload at an arbitrary point and
    // unmasking the halves with carried offsets equals unmasking it whole
    // =========================================================================
    #[test]
    fn prop_mask_offset_composition(
        data in prop::collection::vec(any::<u8>(), 1..500),
        key in any::<[u8; 4]>(),
        cut_seed in any::<prop::sample::Index>(),
    ) {
        let cut = cut_seed.index(data.len());
        let mut whole = data.clone();
        apply_mask(&mut whole, key);

        let mut halves = data;
        let (a, b) = halves.split_at_mut(cut);
        apply_mask_offset(a, key, 0);
        apply_mask_offset(b, key, cut);
        prop_assert_eq!(halves, whole);
    }

    // =========================================================================
    // Property 7: a message streamed across several write calls decodes as
    // one message equal to the concatenation
    // =========================================================================
    #[test]
    fn prop_streamed_write_calls_decode_as_one_message(
        parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 1..5),
        masked in any::<bool>(),
    ) {
        let mut writer = FrameWriter::new(masked, 64);
        let mut wire = Vec::new();
        let last = parts.len() - 1;
        for (i, part) in parts.iter().enumerate() {
            wire.extend(encode(&mut writer, part, OpCode::Binary, i == last));
        }

        let expected: Vec<u8> = parts.concat();
        let (decoded, kind) = decode(&wire, wire.len(), expected.len() + 1);
        prop_assert_eq!(decoded, expected);
        prop_assert_eq!(kind, MessageKind::Binary);
    }
}

// =============================================================================
// Length-encoding boundaries (deterministic; one case per width boundary)
// =============================================================================
#[test]
fn test_length_encoding_boundaries_roundtrip() {
    for (len, marker, header_len) in [
        (0usize, 0u8, 2usize),
        (1, 1, 2),
        (125, 125, 2),
        (126, 126, 4),
        (65535, 126, 4),
        (65536, 127, 10),
    ] {
        let payload = vec![0x5Au8; len];
        let mut writer = FrameWriter::new(false, usize::MAX);
        let wire = encode(&mut writer, &payload, OpCode::Binary, true);

        assert_eq!(wire[1] & 0x7F, marker, "marker for len {len}");
        assert_eq!(wire.len(), header_len + len, "wire size for len {len}");

        let (decoded, _) = decode(&wire, wire.len(), len + 1);
        assert_eq!(decoded.len(), len, "decoded length for len {len}");
        assert_eq!(decoded, payload);
    }
}
