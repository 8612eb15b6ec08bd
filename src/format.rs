// Binary layouts shared by signature and patch files.
//
// Both artifacts open with the same 28-byte header:
//
//   file_hash[16] | file_length:u32 | block_size:u32 | block_count:u32
//
// followed by block_count records. Signature records are 20 bytes:
//
//   start:u32 | size:u32 | weak_sum:u32 | strong_sum:u64
//
// Patch records are 9 bytes, with the region's literal bytes inlined right
// after any record whose flag is nonzero:
//
//   start:u32 | size:u32 | is_remote:u8
//
// All integers little-endian. Streams that end inside a header or record
// are format errors, not I/O errors.

use std::io::{self, Read, Write};

use crate::block::BlockDescriptor;
use crate::error::{Result, SyncError};

/// Byte length of the shared header.
pub const HEADER_LEN: usize = 28;

/// Byte length of one signature block record.
pub const SIGNATURE_RECORD_LEN: usize = 20;

/// Byte length of one patch block record (excluding inlined literals).
pub const PATCH_RECORD_LEN: usize = 9;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Shared signature/patch file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncHeader {
    /// MD5 of the complete new file, checked after reconstruction.
    pub file_hash: [u8; 16],
    /// New-file length in bytes.
    pub file_length: u32,
    /// Nominal block size used when the artifact was built.
    pub block_size: u32,
    /// Number of block records that follow.
    pub block_count: u32,
}

impl SyncHeader {
    /// Write the 28-byte header.
    pub fn encode<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.file_hash)?;
        w.write_all(&self.file_length.to_le_bytes())?;
        w.write_all(&self.block_size.to_le_bytes())?;
        w.write_all(&self.block_count.to_le_bytes())
    }

    /// Read and validate a 28-byte header.
    pub fn decode<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        read_record(r, &mut buf, "header too short: expected 28 bytes")?;

        let mut file_hash = [0u8; 16];
        file_hash.copy_from_slice(&buf[..16]);
        let header = Self {
            file_hash,
            file_length: le_u32(&buf[16..20]),
            block_size: le_u32(&buf[20..24]),
            block_count: le_u32(&buf[24..28]),
        };

        if header.block_count > 0 && header.block_size == 0 {
            return Err(SyncError::format(
                "header declares blocks with a zero block size",
            ));
        }
        Ok(header)
    }
}

// ---------------------------------------------------------------------------
// Signature records
// ---------------------------------------------------------------------------

/// Write one 20-byte signature record.
pub fn encode_signature_record<W: Write + ?Sized>(
    w: &mut W,
    block: &BlockDescriptor,
) -> io::Result<()> {
    w.write_all(&block.start.to_le_bytes())?;
    w.write_all(&block.size.to_le_bytes())?;
    w.write_all(&block.weak_sum.to_le_bytes())?;
    w.write_all(&block.strong_sum.to_le_bytes())
}

/// Read one signature record.
///
/// Parsed descriptors are remote by construction: every signature entry is
/// a new-file block until a matcher proves otherwise. `index`/`count` feed
/// the error message when the record list is cut short.
pub fn decode_signature_record<R: Read + ?Sized>(
    r: &mut R,
    index: u32,
    count: u32,
) -> Result<BlockDescriptor> {
    let mut buf = [0u8; SIGNATURE_RECORD_LEN];
    read_record(
        r,
        &mut buf,
        &format!("signature truncated at block record {index} of {count}"),
    )?;
    Ok(BlockDescriptor {
        start: le_u32(&buf[0..4]),
        size: le_u32(&buf[4..8]),
        is_remote: true,
        weak_sum: le_u32(&buf[8..12]),
        strong_sum: le_u64(&buf[12..20]),
    })
}

// ---------------------------------------------------------------------------
// Patch records
// ---------------------------------------------------------------------------

/// One parsed patch record; inlined literals (if any) follow in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRecord {
    pub start: u32,
    pub size: u32,
    pub is_remote: bool,
}

/// Write one 9-byte patch record.
pub fn encode_patch_record<W: Write + ?Sized>(
    w: &mut W,
    block: &BlockDescriptor,
) -> io::Result<()> {
    w.write_all(&block.start.to_le_bytes())?;
    w.write_all(&block.size.to_le_bytes())?;
    w.write_all(&[block.is_remote as u8])
}

/// Read one patch record (any nonzero flag byte means remote).
pub fn decode_patch_record<R: Read + ?Sized>(
    r: &mut R,
    index: u32,
    count: u32,
) -> Result<PatchRecord> {
    let mut buf = [0u8; PATCH_RECORD_LEN];
    read_record(
        r,
        &mut buf,
        &format!("patch truncated at block record {index} of {count}"),
    )?;
    Ok(PatchRecord {
        start: le_u32(&buf[0..4]),
        size: le_u32(&buf[4..8]),
        is_remote: buf[8] != 0,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Copy exactly `len` bytes from `reader` to `writer`.
///
/// A stream that ends early surfaces as `UnexpectedEof` with the byte
/// counts; callers decide whether that is a format or an I/O problem.
pub(crate) fn copy_exact<R: Read, W: Write + ?Sized>(
    mut reader: R,
    writer: &mut W,
    len: u64,
) -> io::Result<()> {
    let copied = io::copy(&mut reader.by_ref().take(len), writer)?;
    if copied < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("copied {copied} of {len} bytes"),
        ));
    }
    Ok(())
}

#[inline]
fn le_u32(bytes: &[u8]) -> u32 {
    debug_assert_eq!(bytes.len(), 4);
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
fn le_u64(bytes: &[u8]) -> u64 {
    debug_assert_eq!(bytes.len(), 8);
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// `read_exact` that reports a premature end of stream as a format error.
fn read_record<R: Read + ?Sized>(r: &mut R, buf: &mut [u8], short_msg: &str) -> Result<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SyncError::format(short_msg)
        } else {
            SyncError::io("reading record", e)
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
