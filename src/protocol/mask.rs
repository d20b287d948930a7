//! XOR payload masking (RFC 6455 §5.3).
//!
//! Payload byte `i` is XORed with `key[i % 4]`. Because the incremental
//! reader unmasks a frame's payload in pieces, [`apply_mask_offset`] lets a
//! resumed copy continue the key cycle at the right phase.

/// XOR `data` with `key`, starting the key cycle at byte 0.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    apply_mask_offset(data, key, 0);
}

/// XOR `data` with `key`, where `data[0]` sits at position `offset` of the
/// overall payload. Processes a word at a time with a key rotated to the
/// right phase; the remainder is handled bytewise.
pub fn apply_mask_offset(data: &mut [u8], key: [u8; 4], offset: usize) {
    let rot = [
        key[offset % 4],
        key[(offset + 1) % 4],
        key[(offset + 2) % 4],
        key[(offset + 3) % 4],
    ];
    let rot_word = u32::from_ne_bytes(rot);

    let split = data.len() - data.len() % 4;
    let (head, tail) = data.split_at_mut(split);
    for chunk in head.chunks_exact_mut(4) {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ rot_word;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    for (i, byte) in tail.iter_mut().enumerate() {
        *byte ^= rot[i % 4];
    }
}
