// Signature-mode reconstruction: old file + signature + range fetcher.
//
// The zsync-style delivery mode. The signature's block sums are matched
// against the old file, then the output is assembled descriptor by
// descriptor: local regions are copied from the old file, remote regions
// are range-fetched from wherever the new file is served. The finished
// output is re-hashed against the header.

use std::io::{BufWriter, Read, Seek, SeekFrom, Write};

use log::debug;

use crate::block::BlockDescriptor;
use crate::error::{Result, SyncError};
use crate::fetch::{ByteRange, RangeFetcher};
use crate::format::{SyncHeader, copy_exact};
use crate::matcher::{self, MatchStats};
use crate::patch::verify_output;
use crate::signature::Signature;

/// Counters from one reconstruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeStats {
    /// Bytes copied from the old file.
    pub local_bytes: u64,
    /// Bytes obtained from the range fetcher.
    pub remote_bytes: u64,
    /// Individual ranges fetched.
    pub fetched_ranges: usize,
    /// Total bytes written.
    pub output_len: u64,
}

/// Write the output from an already-matched descriptor list, then verify.
///
/// Descriptors are consumed in order; writes are sequential, so the output
/// needs no pre-sizing. On a hash mismatch the written file is left in
/// place and a verification error is returned.
pub fn reconstruct<O, F, W>(
    old_file: &mut O,
    header: &SyncHeader,
    blocks: &[BlockDescriptor],
    fetcher: &mut F,
    output: &mut W,
) -> Result<MergeStats>
where
    O: Read + Seek,
    F: RangeFetcher + ?Sized,
    W: Read + Write + Seek,
{
    let mut stats = MergeStats::default();
    {
        let mut writer = BufWriter::new(&mut *output);
        for block in blocks {
            if block.size == 0 {
                continue;
            }
            if block.is_remote {
                let range = ByteRange::for_block(block.start as u64, block.size as u64);
                let bytes = fetcher.fetch(range)?;
                if bytes.len() as u64 != range.len() {
                    return Err(SyncError::RemoteFetch {
                        start: range.start,
                        end: range.end,
                        reason: format!(
                            "fetcher returned {} bytes for a {}-byte range",
                            bytes.len(),
                            range.len()
                        ),
                    });
                }
                writer
                    .write_all(&bytes)
                    .map_err(|e| SyncError::io("writing fetched range", e))?;
                stats.remote_bytes += block.size as u64;
                stats.fetched_ranges += 1;
            } else {
                old_file
                    .seek(SeekFrom::Start(block.start as u64))
                    .map_err(|e| SyncError::io("seeking old file", e))?;
                copy_exact(&mut *old_file, &mut writer, block.size as u64).map_err(|e| {
                    SyncError::io(
                        format!(
                            "copying {} bytes from old file at offset {}",
                            block.size, block.start
                        ),
                        e,
                    )
                })?;
                stats.local_bytes += block.size as u64;
            }
        }
        writer
            .flush()
            .map_err(|e| SyncError::io("flushing output", e))?;
    }
    stats.output_len = stats.local_bytes + stats.remote_bytes;

    verify_output(output, header)?;

    debug!(
        "merge: {} local bytes, {} remote bytes over {} fetches",
        stats.local_bytes, stats.remote_bytes, stats.fetched_ranges
    );
    Ok(stats)
}

/// Full signature-mode merge: match the signature against the old file,
/// then reconstruct and verify.
///
/// The signature's descriptor list is updated in place (matched blocks
/// flipped local and coalesced), mirroring what any signature consumer
/// would hold after the pass.
pub fn merge<O, F, W>(
    old_file: &mut O,
    signature: &mut Signature,
    fetcher: &mut F,
    output: &mut W,
) -> Result<(MatchStats, MergeStats)>
where
    O: Read + Seek,
    F: RangeFetcher + ?Sized,
    W: Read + Write + Seek,
{
    let old_len = old_file
        .seek(SeekFrom::End(0))
        .map_err(|e| SyncError::io("sizing old file", e))?;
    old_file
        .rewind()
        .map_err(|e| SyncError::io("seeking old file", e))?;

    let match_stats = matcher::match_blocks(
        old_file,
        old_len,
        &mut signature.blocks,
        signature.header.block_size,
    )?;

    let merge_stats = reconstruct(
        old_file,
        &signature.header,
        &signature.blocks,
        fetcher,
        output,
    )?;
    Ok((match_stats, merge_stats))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
