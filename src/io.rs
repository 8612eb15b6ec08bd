// File-level helpers for signature, patch and sync operations.
//
// Path-in/path-out wrappers around the core engine with proper buffered
// I/O and per-operation stats. This layer also owns artifact hygiene: a
// failed build deletes its partial output, a failed reconstruction deletes
// the partial file unless the failure is a verification mismatch — that
// output is left in place so the caller can inspect it.

use std::fs::{self, File, OpenOptions};
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::error::{Result, SyncError};
use crate::fetch::RangeFetcher;
use crate::patch::{self, ApplyStats, PatchStats};
use crate::signature::Signature;
use crate::sync;

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `sign_file()`.
#[derive(Debug, Clone)]
pub struct SignStats {
    /// New-file size in bytes.
    pub file_size: u64,
    /// Block size selected for the file.
    pub block_size: u32,
    /// Number of block records in the signature.
    pub block_count: u32,
    /// Signature output size in bytes.
    pub signature_size: u64,
}

/// Statistics returned by `diff_file()`.
#[derive(Debug, Clone)]
pub struct DiffStats {
    /// Old-file size in bytes.
    pub old_size: u64,
    /// New-file size in bytes.
    pub new_size: u64,
    /// Patch output size in bytes.
    pub patch_size: u64,
    /// Per-build counters from the patch writer.
    pub patch: PatchStats,
}

/// Statistics returned by `sync_file()`.
#[derive(Debug, Clone)]
pub struct SyncStats {
    /// Blocks the matcher resolved against the old file.
    pub matched_blocks: usize,
    /// Bytes copied from the old file.
    pub local_bytes: u64,
    /// Bytes obtained through the range fetcher.
    pub remote_bytes: u64,
    /// Individual ranges fetched.
    pub fetched_ranges: usize,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
}

// ---------------------------------------------------------------------------
// sign_file
// ---------------------------------------------------------------------------

/// Build the signature of `new_path` and write it to `signature_path`.
///
/// On failure the partial signature file is removed.
pub fn sign_file(new_path: &Path, signature_path: &Path) -> Result<SignStats> {
    let result = sign_file_inner(new_path, signature_path);
    if result.is_err() {
        let _ = fs::remove_file(signature_path);
    }
    result
}

fn sign_file_inner(new_path: &Path, signature_path: &Path) -> Result<SignStats> {
    let new_file = open(new_path)?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, new_file);
    let signature = Signature::from_reader(&mut reader)?;

    let out = create(signature_path)?;
    let mut writer = std::io::BufWriter::with_capacity(BUF_SIZE, out);
    signature.write_to(&mut writer)?;
    let out = writer
        .into_inner()
        .map_err(|e| SyncError::io("flushing signature", e.into_error()))?;
    let signature_size = out
        .metadata()
        .map_err(|e| SyncError::io("sizing signature", e))?
        .len();

    debug!(
        "signed {}: {} blocks, {} signature bytes",
        new_path.display(),
        signature.header.block_count,
        signature_size
    );
    Ok(SignStats {
        file_size: signature.header.file_length as u64,
        block_size: signature.header.block_size,
        block_count: signature.header.block_count,
        signature_size,
    })
}

// ---------------------------------------------------------------------------
// diff_file
// ---------------------------------------------------------------------------

/// Build a self-contained patch turning `old_path` into `new_path`.
///
/// On failure the partial patch file is removed.
pub fn diff_file(old_path: &Path, new_path: &Path, patch_path: &Path) -> Result<DiffStats> {
    let result = diff_file_inner(old_path, new_path, patch_path);
    if result.is_err() {
        let _ = fs::remove_file(patch_path);
    }
    result
}

fn diff_file_inner(old_path: &Path, new_path: &Path, patch_path: &Path) -> Result<DiffStats> {
    let mut new_reader = BufReader::with_capacity(BUF_SIZE, open(new_path)?);
    let mut old_reader = BufReader::with_capacity(BUF_SIZE, open(old_path)?);

    let out = create(patch_path)?;
    let mut writer = std::io::BufWriter::with_capacity(BUF_SIZE, out);
    let stats = patch::build_patch(&mut new_reader, &mut old_reader, &mut writer)?;
    let out = writer
        .into_inner()
        .map_err(|e| SyncError::io("flushing patch", e.into_error()))?;
    let patch_size = out
        .metadata()
        .map_err(|e| SyncError::io("sizing patch", e))?
        .len();

    let old_size = file_len(old_path)?;
    let new_size = file_len(new_path)?;
    debug!(
        "diffed {} -> {}: {} patch bytes, {} literal",
        old_path.display(),
        new_path.display(),
        patch_size,
        stats.literal_bytes
    );
    Ok(DiffStats {
        old_size,
        new_size,
        patch_size,
        patch: stats,
    })
}

// ---------------------------------------------------------------------------
// apply_file
// ---------------------------------------------------------------------------

/// Apply the patch at `patch_path` to `old_path`, writing `output_path`.
///
/// A verification mismatch leaves the written output for inspection; any
/// other failure removes the partial output.
pub fn apply_file(old_path: &Path, patch_path: &Path, output_path: &Path) -> Result<ApplyStats> {
    match apply_file_inner(old_path, patch_path, output_path) {
        Ok(stats) => Ok(stats),
        Err(SyncError::Verification {
            expected, actual, ..
        }) => Err(SyncError::Verification {
            target: output_path.display().to_string(),
            expected,
            actual,
        }),
        Err(e) => {
            let _ = fs::remove_file(output_path);
            Err(e)
        }
    }
}

fn apply_file_inner(old_path: &Path, patch_path: &Path, output_path: &Path) -> Result<ApplyStats> {
    let mut old_reader = BufReader::with_capacity(BUF_SIZE, open(old_path)?);
    let mut patch_reader = BufReader::with_capacity(BUF_SIZE, open(patch_path)?);
    let mut output = create_rw(output_path)?;
    patch::apply_patch(&mut old_reader, &mut patch_reader, &mut output)
}

// ---------------------------------------------------------------------------
// sync_file
// ---------------------------------------------------------------------------

/// Reconstruct a new file from `old_path`, the signature at
/// `signature_path`, and a range fetcher serving the new file's bytes.
///
/// Same output hygiene as [`apply_file`].
pub fn sync_file<F: RangeFetcher + ?Sized>(
    old_path: &Path,
    signature_path: &Path,
    fetcher: &mut F,
    output_path: &Path,
) -> Result<SyncStats> {
    match sync_file_inner(old_path, signature_path, fetcher, output_path) {
        Ok(stats) => Ok(stats),
        Err(SyncError::Verification {
            expected, actual, ..
        }) => Err(SyncError::Verification {
            target: output_path.display().to_string(),
            expected,
            actual,
        }),
        Err(e) => {
            let _ = fs::remove_file(output_path);
            Err(e)
        }
    }
}

fn sync_file_inner<F: RangeFetcher + ?Sized>(
    old_path: &Path,
    signature_path: &Path,
    fetcher: &mut F,
    output_path: &Path,
) -> Result<SyncStats> {
    let mut signature_reader = BufReader::with_capacity(BUF_SIZE, open(signature_path)?);
    let mut signature = Signature::read_from(&mut signature_reader)?;

    let mut old_reader = BufReader::with_capacity(BUF_SIZE, open(old_path)?);
    let mut output = create_rw(output_path)?;
    let (match_stats, merge_stats) =
        sync::merge(&mut old_reader, &mut signature, fetcher, &mut output)?;

    Ok(SyncStats {
        matched_blocks: match_stats.matched_blocks,
        local_bytes: merge_stats.local_bytes,
        remote_bytes: merge_stats.remote_bytes,
        fetched_ranges: merge_stats.fetched_ranges,
        output_size: merge_stats.output_len,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| SyncError::io(format!("opening {}", path.display()), e))
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| SyncError::io(format!("creating {}", path.display()), e))
}

/// Open an output for writing and later read-back verification.
fn create_rw(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| SyncError::io(format!("creating {}", path.display()), e))
}

fn file_len(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)
        .map_err(|e| SyncError::io(format!("sizing {}", path.display()), e))?
        .len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
