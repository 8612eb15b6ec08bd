// Rolling block search: find new-file blocks inside the old file.
//
// The old stream is scanned strictly forward with a block-sized circular
// window in two modes:
//   - **Jump mode** (at start, and after every confirmed match): refill the
//     window wholesale and compute its weak checksum from scratch.
//   - **Roll mode** (after a miss): slide the window by one byte and update
//     the weak checksum incrementally.
//
// Every position is screened by the presence table before the weak-sum
// index is probed; surviving candidates are confirmed by exact length plus
// the ring-aware strong hash. The first still-remote candidate in ascending
// descriptor order wins, its `start` is rewritten to the old-file offset,
// and the scan jumps a full block ahead.
//
// Amortized O(L) over the old file; per-position work is O(1) expected, and
// degrades only to the size of one weak-sum bucket.

use std::io::Read;

use log::debug;

use crate::block::{BlockDescriptor, coalesce};
use crate::error::{Result, SyncError};
use crate::hash::strong::strong_sum_wrapped;
use crate::hash::table::BlockIndex;
use crate::hash::weak::{weak_checksum, weak_roll};
use crate::ring::RingBuffer;

/// Counters from one matching pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchStats {
    /// Descriptors flipped from remote to local.
    pub matched_blocks: usize,
    /// Total true bytes of those descriptors.
    pub matched_bytes: u64,
}

/// Run the rolling search without coalescing.
///
/// `old` must be positioned at the start of the old file and is read
/// strictly forward; `old_len` is its total length. Descriptors that match
/// are marked local with `start` rewritten to the matched old-file offset;
/// the rest keep `is_remote = true`.
pub fn find_matches<R: Read + ?Sized>(
    old: &mut R,
    old_len: u64,
    blocks: &mut [BlockDescriptor],
    block_size: u32,
) -> Result<MatchStats> {
    if block_size == 0 {
        return Err(SyncError::format("block size must be non-zero"));
    }
    let block_size = block_size as usize;

    let index = BlockIndex::build(blocks);
    let mut window = RingBuffer::new(block_size);
    let mut stats = MatchStats::default();

    // Window start offset in the old file.
    let mut cursor: u64 = 0;
    // True (non-padding) bytes currently in the window.
    let mut occupied: usize = 0;
    let mut weak: u32 = 0;
    let mut jump = true;

    while cursor < old_len {
        // Offsets past the 32-bit format limit cannot be recorded.
        if cursor > u32::MAX as u64 {
            break;
        }

        if jump {
            occupied = window
                .refill(old)
                .map_err(|e| SyncError::io(format!("reading old file at offset {cursor}"), e))?;
            weak = weak_checksum(window.as_slice());
        } else {
            let in_byte = if cursor + block_size as u64 <= old_len {
                let mut byte = [0u8; 1];
                old.read_exact(&mut byte).map_err(|e| {
                    SyncError::io(format!("reading old file at offset {cursor}"), e)
                })?;
                byte[0]
            } else {
                // Window slides past end of input: pad with a zero.
                occupied -= 1;
                0
            };
            let out_byte = window.roll(in_byte);
            weak = weak_roll(weak, out_byte, in_byte, block_size);
        }

        let mut matched = None;
        if index.maybe_contains(weak) {
            let candidates = index.candidates(weak);
            if !candidates.is_empty() {
                let strong = strong_sum_wrapped(window.as_slice(), window.head());
                for &i in candidates {
                    let block = &blocks[i];
                    if block.is_remote
                        && block.size as usize == occupied
                        && block.strong_sum == strong
                    {
                        matched = Some(i);
                        break;
                    }
                }
            }
        }

        match matched {
            Some(i) => {
                blocks[i].is_remote = false;
                blocks[i].start = cursor as u32;
                stats.matched_blocks += 1;
                stats.matched_bytes += blocks[i].size as u64;
                cursor += block_size as u64;
                jump = true;
            }
            None => {
                cursor += 1;
                jump = false;
            }
        }
    }

    debug!(
        "matched {}/{} blocks ({} bytes) against {} old bytes",
        stats.matched_blocks,
        blocks.len(),
        stats.matched_bytes,
        old_len
    );
    Ok(stats)
}

/// Full matching pass: rolling search, then coalesce adjacent same-kind
/// descriptors into minimal ranges.
pub fn match_blocks<R: Read + ?Sized>(
    old: &mut R,
    old_len: u64,
    blocks: &mut Vec<BlockDescriptor>,
    block_size: u32,
) -> Result<MatchStats> {
    let stats = find_matches(old, old_len, blocks, block_size)?;
    coalesce(blocks);
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BS: u32 = 8;

    /// Chunk `data` into test descriptors the way the signature builder
    /// would, at block size [`BS`].
    fn descriptors(data: &[u8]) -> Vec<BlockDescriptor> {
        let mut blocks = Vec::new();
        let mut offset = 0usize;
        while offset < data.len() {
            let size = (data.len() - offset).min(BS as usize);
            let mut padded = vec![0u8; BS as usize];
            padded[..size].copy_from_slice(&data[offset..offset + size]);
            blocks.push(BlockDescriptor::from_padded(
                offset as u32,
                size as u32,
                &padded,
            ));
            offset += size;
        }
        blocks
    }

    fn run(old: &[u8], blocks: &mut Vec<BlockDescriptor>) -> MatchStats {
        match_blocks(&mut Cursor::new(old), old.len() as u64, blocks, BS).unwrap()
    }

    #[test]
    fn identical_input_matches_everything() {
        let data = b"ABCDEFGHijklmnop";
        let mut blocks = descriptors(data);
        let stats = find_matches(&mut Cursor::new(data), data.len() as u64, &mut blocks, BS)
            .unwrap();
        assert_eq!(stats.matched_blocks, 2);
        assert_eq!(stats.matched_bytes, 16);
        assert!(blocks.iter().all(|b| !b.is_remote));
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[1].start, 8);
    }

    #[test]
    fn rolling_finds_shifted_content() {
        let new = b"ABCDEFGHijklmnop";
        // Both blocks present in the old file at shifted, non-adjacent spots.
        let old = b"xxxABCDEFGHyyyijklmnopzz";
        let mut blocks = descriptors(new);
        let stats = find_matches(&mut Cursor::new(old), old.len() as u64, &mut blocks, BS)
            .unwrap();
        assert_eq!(stats.matched_blocks, 2);
        assert_eq!(blocks[0].start, 3);
        assert!(!blocks[0].is_remote);
        assert_eq!(blocks[1].start, 14);
        assert!(!blocks[1].is_remote);
    }

    #[test]
    fn disjoint_content_stays_remote() {
        let new = b"AAAAAAAABBBBBBBB";
        let old = b"zzzzzzzzzzzzzzzzzzzz";
        let mut blocks = descriptors(new);
        let stats = find_matches(&mut Cursor::new(old), old.len() as u64, &mut blocks, BS)
            .unwrap();
        assert_eq!(stats.matched_blocks, 0);
        assert!(blocks.iter().all(|b| b.is_remote));
        // Original new-file offsets untouched.
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[1].start, 8);
    }

    #[test]
    fn empty_old_file_is_a_noop_scan() {
        let new = b"ABCDEFGH";
        let mut blocks = descriptors(new);
        let stats = find_matches(&mut Cursor::new(b""), 0, &mut blocks, BS).unwrap();
        assert_eq!(stats.matched_blocks, 0);
        assert!(blocks[0].is_remote);
    }

    #[test]
    fn short_final_block_matches_only_exact_length() {
        // Final block is 2 true bytes; it must match at the old file's tail
        // where the window holds exactly 2 occupied bytes.
        let new = b"ABCDEFGHij";
        let old = b"ABCDEFGHij";
        let mut blocks = descriptors(new);
        find_matches(&mut Cursor::new(old), old.len() as u64, &mut blocks, BS).unwrap();
        assert!(!blocks[1].is_remote);
        assert_eq!(blocks[1].start, 8);
        assert_eq!(blocks[1].size, 2);
    }

    #[test]
    fn padding_lookalike_rejected_by_length_check() {
        // Old window content equals the padded block bytes, but occupies the
        // full window; the recorded size differs, so no match.
        let new = b"ab";
        let old = b"ab\0\0\0\0\0\0z";
        let mut blocks = descriptors(new);
        assert_eq!(blocks[0].size, 2);
        find_matches(&mut Cursor::new(old), old.len() as u64, &mut blocks, BS).unwrap();
        assert!(blocks[0].is_remote, "padded lookalike must not match");
    }

    #[test]
    fn tampered_strong_sum_never_matches() {
        let data = b"ABCDEFGH";
        let mut blocks = descriptors(data);
        blocks[0].strong_sum ^= 1;
        find_matches(&mut Cursor::new(data), data.len() as u64, &mut blocks, BS).unwrap();
        assert!(blocks[0].is_remote);
    }

    #[test]
    fn duplicate_blocks_claim_distinct_offsets() {
        // Two identical new-file blocks, old file holds the content twice.
        let new = b"SAMEDATASAMEDATA";
        let old = b"..SAMEDATA..SAMEDATA";
        let mut blocks = descriptors(new);
        find_matches(&mut Cursor::new(old), old.len() as u64, &mut blocks, BS).unwrap();
        assert_eq!(blocks[0].start, 2);
        assert_eq!(blocks[1].start, 12);
        assert!(!blocks[0].is_remote && !blocks[1].is_remote);
    }

    #[test]
    fn duplicate_blocks_single_occurrence_matches_first_only() {
        let new = b"SAMEDATASAMEDATA";
        let old = b"..SAMEDATA..";
        let mut blocks = descriptors(new);
        find_matches(&mut Cursor::new(old), old.len() as u64, &mut blocks, BS).unwrap();
        assert!(!blocks[0].is_remote);
        assert_eq!(blocks[0].start, 2);
        assert!(blocks[1].is_remote);
    }

    #[test]
    fn match_blocks_coalesces_adjacent_runs() {
        let data = b"ABCDEFGHijklmnop";
        let mut blocks = descriptors(data);
        run(data, &mut blocks);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[0].size, 16);
        assert!(!blocks[0].is_remote);
    }

    #[test]
    fn zero_block_size_is_a_format_error() {
        let mut blocks = Vec::new();
        let err = find_matches(&mut Cursor::new(b"x"), 1, &mut blocks, 0).unwrap_err();
        assert!(matches!(err, SyncError::Format { .. }));
    }
}
