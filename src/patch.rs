// Self-contained patches: build and apply.
//
// The bsdiff-style delivery mode. Building runs the same signature and
// matching machinery as sync mode, then inlines the literal bytes of every
// still-remote region straight into the patch, so application needs only
// the old file and the patch stream — no network.

use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};

use log::debug;

use crate::error::{Result, SyncError};
use crate::format::{self, SyncHeader, copy_exact};
use crate::hash::file::file_hash;
use crate::matcher;
use crate::signature::Signature;

/// Counters from building a patch.
#[derive(Debug, Clone, Copy)]
pub struct PatchStats {
    /// Records written (post-coalescing).
    pub record_count: u32,
    /// Blocks the matcher resolved against the old file.
    pub matched_blocks: usize,
    /// New-file bytes embedded verbatim in the patch.
    pub literal_bytes: u64,
}

/// Counters from applying a patch.
#[derive(Debug, Clone, Copy)]
pub struct ApplyStats {
    /// Bytes copied out of the old file.
    pub local_bytes: u64,
    /// Bytes copied out of the patch's inlined literals.
    pub literal_bytes: u64,
    /// Total bytes written to the output.
    pub output_len: u64,
}

/// Build a self-contained patch that turns `old_file` into `new_file`.
///
/// Chunks and hashes the new file, resolves blocks against the old file
/// with the rolling matcher, coalesces, and serializes records with literal
/// bytes inlined for every region the old file does not contain.
pub fn build_patch<N, O, W>(new_file: &mut N, old_file: &mut O, out: &mut W) -> Result<PatchStats>
where
    N: Read + Seek,
    O: Read + Seek,
    W: Write,
{
    let mut signature = Signature::from_reader(new_file)?;

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

    let header = SyncHeader {
        block_count: signature.blocks.len() as u32,
        ..signature.header
    };
    header
        .encode(out)
        .map_err(|e| SyncError::io("writing patch header", e))?;

    let mut literal_bytes: u64 = 0;
    for block in &signature.blocks {
        format::encode_patch_record(out, block)
            .map_err(|e| SyncError::io("writing patch block record", e))?;
        if block.is_remote {
            new_file
                .seek(SeekFrom::Start(block.start as u64))
                .map_err(|e| SyncError::io("seeking new file", e))?;
            copy_exact(&mut *new_file, out, block.size as u64).map_err(|e| {
                SyncError::io(
                    format!("inlining {} literal bytes at offset {}", block.size, block.start),
                    e,
                )
            })?;
            literal_bytes += block.size as u64;
        }
    }

    debug!(
        "patch: {} records, {} literal bytes, {} blocks matched",
        header.block_count, literal_bytes, match_stats.matched_blocks
    );
    Ok(PatchStats {
        record_count: header.block_count,
        matched_blocks: match_stats.matched_blocks,
        literal_bytes,
    })
}

/// Reconstruct the new file from an old file plus a patch stream.
///
/// Records are consumed in order: remote records pull their inlined literal
/// bytes from the patch, local records copy `size` bytes from the old file
/// at `start`. The finished output is re-hashed and compared against the
/// header; a mismatch is reported as a verification failure with the output
/// left in place for inspection.
pub fn apply_patch<O, P, W>(old_file: &mut O, patch: &mut P, output: &mut W) -> Result<ApplyStats>
where
    O: Read + Seek,
    P: Read,
    W: Read + Write + Seek,
{
    let header = SyncHeader::decode(patch)?;

    let mut local_bytes: u64 = 0;
    let mut literal_bytes: u64 = 0;
    {
        let mut writer = BufWriter::new(&mut *output);
        for i in 0..header.block_count {
            let record = format::decode_patch_record(patch, i, header.block_count)?;
            if record.is_remote {
                copy_exact(&mut *patch, &mut writer, record.size as u64).map_err(|e| {
                    if e.kind() == io::ErrorKind::UnexpectedEof {
                        SyncError::format(format!(
                            "patch truncated inside the literal data of record {i}: {e}"
                        ))
                    } else {
                        SyncError::io("reading patch literal data", e)
                    }
                })?;
                literal_bytes += record.size as u64;
            } else {
                old_file
                    .seek(SeekFrom::Start(record.start as u64))
                    .map_err(|e| SyncError::io("seeking old file", e))?;
                copy_exact(&mut *old_file, &mut writer, record.size as u64).map_err(|e| {
                    SyncError::io(
                        format!(
                            "copying {} bytes from old file at offset {}",
                            record.size, record.start
                        ),
                        e,
                    )
                })?;
                local_bytes += record.size as u64;
            }
        }
        writer
            .flush()
            .map_err(|e| SyncError::io("flushing output", e))?;
    }

    verify_output(output, &header)?;

    debug!(
        "apply: {local_bytes} bytes from old file, {literal_bytes} literal bytes"
    );
    Ok(ApplyStats {
        local_bytes,
        literal_bytes,
        output_len: local_bytes + literal_bytes,
    })
}

/// Re-hash a finished output stream and compare against the header.
pub(crate) fn verify_output<W: Read + Seek>(output: &mut W, header: &SyncHeader) -> Result<()> {
    output
        .rewind()
        .map_err(|e| SyncError::io("seeking output for verification", e))?;
    let (actual, _) =
        file_hash(output).map_err(|e| SyncError::io("hashing output for verification", e))?;
    if actual != header.file_hash {
        return Err(SyncError::Verification {
            target: "reconstructed output".into(),
            expected: header.file_hash,
            actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(old: &[u8], new: &[u8]) -> (Vec<u8>, ApplyStats) {
        let mut patch_bytes = Vec::new();
        build_patch(
            &mut Cursor::new(new),
            &mut Cursor::new(old),
            &mut patch_bytes,
        )
        .unwrap();

        let mut rebuilt = Cursor::new(Vec::new());
        let stats = apply_patch(
            &mut Cursor::new(old),
            &mut Cursor::new(&patch_bytes),
            &mut rebuilt,
        )
        .unwrap();
        (rebuilt.into_inner(), stats)
    }

    #[test]
    fn identical_files_produce_literal_free_patch() {
        let data: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
        let mut patch_bytes = Vec::new();
        let stats = build_patch(
            &mut Cursor::new(&data),
            &mut Cursor::new(&data),
            &mut patch_bytes,
        )
        .unwrap();
        assert_eq!(stats.literal_bytes, 0);
        // Everything coalesces into one local record.
        assert_eq!(stats.record_count, 1);
        assert_eq!(
            patch_bytes.len(),
            format::HEADER_LEN + format::PATCH_RECORD_LEN
        );

        let mut rebuilt = Cursor::new(Vec::new());
        apply_patch(
            &mut Cursor::new(&data),
            &mut Cursor::new(&patch_bytes),
            &mut rebuilt,
        )
        .unwrap();
        assert_eq!(rebuilt.into_inner(), data);
    }

    #[test]
    fn empty_old_file_embeds_everything() {
        let new: Vec<u8> = (0..5000u32).map(|i| (i * 31 % 256) as u8).collect();
        let mut patch_bytes = Vec::new();
        let stats = build_patch(
            &mut Cursor::new(&new),
            &mut Cursor::new(b"" as &[u8]),
            &mut patch_bytes,
        )
        .unwrap();
        assert_eq!(stats.matched_blocks, 0);
        assert_eq!(stats.literal_bytes, 5000);
        assert_eq!(stats.record_count, 1);

        let (rebuilt, apply) = {
            let mut out = Cursor::new(Vec::new());
            let apply = apply_patch(
                &mut Cursor::new(b"" as &[u8]),
                &mut Cursor::new(&patch_bytes),
                &mut out,
            )
            .unwrap();
            (out.into_inner(), apply)
        };
        assert_eq!(rebuilt, new);
        assert_eq!(apply.literal_bytes, 5000);
        assert_eq!(apply.local_bytes, 0);
    }

    #[test]
    fn empty_new_file_roundtrips() {
        let (rebuilt, stats) = roundtrip(b"whatever came before", b"");
        assert!(rebuilt.is_empty());
        assert_eq!(stats.output_len, 0);
    }

    #[test]
    fn partial_overlap_mixes_sources() {
        // Old file holds the first half of the new file, shifted inward.
        let mut new = vec![0u8; 6000];
        for (i, byte) in new.iter_mut().enumerate() {
            *byte = (i % 241) as u8;
        }
        let mut old = b"prefix-junk-".to_vec();
        old.extend_from_slice(&new[..4096]);

        let mut patch_bytes = Vec::new();
        let stats = build_patch(
            &mut Cursor::new(&new),
            &mut Cursor::new(&old),
            &mut patch_bytes,
        )
        .unwrap();
        assert!(stats.matched_blocks >= 2, "first two blocks should match");
        assert!(stats.literal_bytes < 6000);

        let mut rebuilt = Cursor::new(Vec::new());
        apply_patch(
            &mut Cursor::new(&old),
            &mut Cursor::new(&patch_bytes),
            &mut rebuilt,
        )
        .unwrap();
        assert_eq!(rebuilt.into_inner(), new);
    }

    #[test]
    fn corrupted_literal_fails_verification() {
        let new = vec![0x5Au8; 3000];
        let mut patch_bytes = Vec::new();
        build_patch(
            &mut Cursor::new(&new),
            &mut Cursor::new(b"" as &[u8]),
            &mut patch_bytes,
        )
        .unwrap();

        // Flip one literal byte past the header and record.
        let idx = format::HEADER_LEN + format::PATCH_RECORD_LEN + 100;
        patch_bytes[idx] ^= 0xFF;

        let mut rebuilt = Cursor::new(Vec::new());
        let err = apply_patch(
            &mut Cursor::new(b"" as &[u8]),
            &mut Cursor::new(&patch_bytes),
            &mut rebuilt,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Verification { .. }), "{err}");
        // The corrupted output is left for inspection.
        assert_eq!(rebuilt.get_ref().len(), 3000);
    }

    #[test]
    fn truncated_literals_are_format_errors() {
        let new = vec![1u8; 3000];
        let mut patch_bytes = Vec::new();
        build_patch(
            &mut Cursor::new(&new),
            &mut Cursor::new(b"" as &[u8]),
            &mut patch_bytes,
        )
        .unwrap();
        patch_bytes.truncate(patch_bytes.len() - 10);

        let mut rebuilt = Cursor::new(Vec::new());
        let err = apply_patch(
            &mut Cursor::new(b"" as &[u8]),
            &mut Cursor::new(&patch_bytes),
            &mut rebuilt,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Format { .. }), "{err}");
    }

    #[test]
    fn old_file_shorter_than_record_is_io_error() {
        let data = vec![0x11u8; 4096];
        let mut patch_bytes = Vec::new();
        build_patch(
            &mut Cursor::new(&data),
            &mut Cursor::new(&data),
            &mut patch_bytes,
        )
        .unwrap();

        // Apply against a truncated old file.
        let mut rebuilt = Cursor::new(Vec::new());
        let err = apply_patch(
            &mut Cursor::new(&data[..100]),
            &mut Cursor::new(&patch_bytes),
            &mut rebuilt,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }), "{err}");
    }
}
