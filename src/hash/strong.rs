// Streaming 64-bit strong hash used to confirm weak-checksum candidates.
//
// xxHash64-style construction: 8-byte little-endian words are absorbed into
// a single lane, then the state is finalized with shift/xor/multiply
// avalanche mixing. Not cryptographic; collision risk on top of an exact
// length check is accepted.
//
// Region addressing is ring-aware: the matcher keeps its window in a
// circular buffer, so a block's bytes may start mid-buffer and wrap past the
// physical end. Hashing consumes the *logical* sequence, making the result
// invariant under buffer rotation.

const PRIME64_1: u64 = 11_400_714_785_074_694_791;
const PRIME64_2: u64 = 14_029_467_366_897_019_727;
const PRIME64_3: u64 = 1_609_587_929_392_839_161;
const PRIME64_4: u64 = 9_650_029_242_287_828_579;
const PRIME64_5: u64 = 2_870_177_450_012_600_261;

/// Strong hash of `data` read linearly.
#[inline]
pub fn strong_sum(data: &[u8]) -> u64 {
    strong_sum_wrapped(data, 0)
}

/// Strong hash of the logical byte sequence stored in `ring` starting at
/// physical index `head`, wrapping past the end of the buffer.
///
/// Words are assembled 8 logical bytes at a time; when the buffer length is
/// not a multiple of 8 the final word keeps wrapping from the logical start,
/// so every input length is consumed in whole words before the final mix.
pub fn strong_sum_wrapped(ring: &[u8], head: usize) -> u64 {
    let len = ring.len();
    let mut hash = PRIME64_1.wrapping_add(PRIME64_5);

    if len > 0 {
        debug_assert!(head < len);
        let mut idx = head;
        let mut consumed = 0usize;
        while consumed < len {
            let mut word = [0u8; 8];
            for slot in &mut word {
                *slot = ring[idx];
                idx += 1;
                if idx == len {
                    idx = 0;
                }
            }
            hash ^= round(u64::from_le_bytes(word));
            hash = hash
                .rotate_left(27)
                .wrapping_mul(PRIME64_1)
                .wrapping_add(PRIME64_4);
            consumed += 8;
        }
    }

    avalanche(hash)
}

#[inline(always)]
fn round(word: u64) -> u64 {
    word.wrapping_mul(PRIME64_2)
        .rotate_left(31)
        .wrapping_mul(PRIME64_1)
}

#[inline(always)]
fn avalanche(mut hash: u64) -> u64 {
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(PRIME64_2);
    hash ^= hash >> 29;
    hash = hash.wrapping_mul(PRIME64_3);
    hash ^= hash >> 32;
    hash
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
