// Lookup structures for the block matcher.
//
// Two layers, cheapest first:
//   - **Presence table**: 128 booleans keyed by a 7-bit tag cut out of the
//     weak sum. One array load rejects most scan positions before any map
//     lookup happens.
//   - **Weak-sum index**: weak sum -> indices of the descriptors that carry
//     it, in ascending order. Candidates are then confirmed with the strong
//     hash by the matcher.

use std::collections::HashMap;

use crate::block::BlockDescriptor;

/// Number of presence-table slots (one per 7-bit tag value).
pub const PRESENCE_TABLE_SIZE: usize = 128;

/// Tag for the presence table: bits 12..19 of the weak sum.
///
/// Straddles the `a`/`b` component boundary so both halves contribute.
#[inline(always)]
pub fn weak_sum_tag(weak_sum: u32) -> usize {
    ((weak_sum >> 12) & 0x7F) as usize
}

/// Index over a descriptor list, keyed by weak sum.
pub struct BlockIndex {
    buckets: HashMap<u32, Vec<usize>>,
    present: [bool; PRESENCE_TABLE_SIZE],
}

impl BlockIndex {
    /// Index every descriptor in `blocks`.
    pub fn build(blocks: &[BlockDescriptor]) -> Self {
        let mut buckets: HashMap<u32, Vec<usize>> = HashMap::with_capacity(blocks.len());
        let mut present = [false; PRESENCE_TABLE_SIZE];
        for (i, block) in blocks.iter().enumerate() {
            buckets.entry(block.weak_sum).or_default().push(i);
            present[weak_sum_tag(block.weak_sum)] = true;
        }
        Self { buckets, present }
    }

    /// Cheap pre-filter: can any descriptor carry this weak sum?
    ///
    /// False positives are possible (several sums share a tag); false
    /// negatives are not.
    #[inline(always)]
    pub fn maybe_contains(&self, weak_sum: u32) -> bool {
        self.present[weak_sum_tag(weak_sum)]
    }

    /// Descriptor indices sharing `weak_sum`, in ascending order.
    #[inline]
    pub fn candidates(&self, weak_sum: u32) -> &[usize] {
        self.buckets.get(&weak_sum).map_or(&[], Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
