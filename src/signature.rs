// Signature construction and (de)serialization.
//
// A signature is the zsync-style artifact: the whole-file hash plus weak
// and strong sums for every fixed-size block of the new file. It carries no
// file content, so it is cheap to distribute; an old-file holder runs the
// matcher against it and range-fetches whatever stays remote.

use std::io::{self, Read, Seek, Write};

use log::debug;

use crate::block::{BlockDescriptor, block_size_for};
use crate::error::{Result, SyncError};
use crate::format::{self, SyncHeader};
use crate::hash::file::file_hash;

/// A parsed or freshly built signature: header plus per-block checksums.
#[derive(Debug, Clone)]
pub struct Signature {
    pub header: SyncHeader,
    pub blocks: Vec<BlockDescriptor>,
}

impl Signature {
    /// Build the signature of a new file.
    ///
    /// Two passes over the stream: one to hash the full content, one to
    /// chunk it into block sums.
    pub fn from_reader<R: Read + Seek>(new_file: &mut R) -> Result<Self> {
        new_file
            .rewind()
            .map_err(|e| SyncError::io("seeking new file", e))?;
        let (file_hash, file_len) =
            file_hash(new_file).map_err(|e| SyncError::io("hashing new file", e))?;
        new_file
            .rewind()
            .map_err(|e| SyncError::io("seeking new file", e))?;

        let block_size = block_size_for(file_len);
        let blocks = build_block_sums(new_file, file_len, block_size)?;
        debug!(
            "signature: {} bytes -> {} blocks of {}",
            file_len,
            blocks.len(),
            block_size
        );

        Ok(Self {
            header: SyncHeader {
                file_hash,
                file_length: file_len as u32,
                block_size,
                block_count: blocks.len() as u32,
            },
            blocks,
        })
    }

    /// Serialize header and block records.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        debug_assert_eq!(self.blocks.len(), self.header.block_count as usize);
        self.header
            .encode(w)
            .map_err(|e| SyncError::io("writing signature header", e))?;
        for block in &self.blocks {
            format::encode_signature_record(w, block)
                .map_err(|e| SyncError::io("writing signature block record", e))?;
        }
        Ok(())
    }

    /// Parse a signature stream, validating that the records tile the file
    /// the header describes.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let header = SyncHeader::decode(r)?;

        let expected = if header.block_size == 0 {
            0
        } else {
            (header.file_length as u64).div_ceil(header.block_size as u64)
        };
        if header.block_count as u64 != expected {
            return Err(SyncError::format(format!(
                "inconsistent block count: header says {}, a {}-byte file at block size {} needs {}",
                header.block_count, header.file_length, header.block_size, expected
            )));
        }

        let mut blocks = Vec::with_capacity(header.block_count as usize);
        let mut covered: u64 = 0;
        for i in 0..header.block_count {
            let block = format::decode_signature_record(r, i, header.block_count)?;
            covered += block.size as u64;
            blocks.push(block);
        }
        if covered != header.file_length as u64 {
            return Err(SyncError::format(format!(
                "block sizes cover {covered} bytes but the header declares {}",
                header.file_length
            )));
        }

        Ok(Self { header, blocks })
    }
}

/// Chunk a new file into block descriptors at `block_size`.
///
/// Every descriptor starts remote with `start` set to its new-file offset.
/// The final block's checksums are computed over a zero-padded window while
/// `size` records the true byte count. A stream that runs out before
/// `file_len` bytes are consumed is a truncated-input I/O error.
pub fn build_block_sums<R: Read>(
    reader: &mut R,
    file_len: u64,
    block_size: u32,
) -> Result<Vec<BlockDescriptor>> {
    if block_size == 0 {
        return Err(SyncError::format("block size must be non-zero"));
    }
    if file_len > u32::MAX as u64 {
        return Err(SyncError::format(format!(
            "file of {file_len} bytes exceeds the 32-bit sync format limit"
        )));
    }

    let bs = block_size as usize;
    let mut buf = vec![0u8; bs];
    let mut blocks = Vec::with_capacity(file_len.div_ceil(block_size as u64) as usize);

    let mut offset: u64 = 0;
    while offset < file_len {
        let want = ((file_len - offset) as usize).min(bs);
        let got = read_full(reader, &mut buf[..want])
            .map_err(|e| SyncError::io(format!("reading new file block at offset {offset}"), e))?;
        if got < want {
            return Err(SyncError::io(
                format!("reading new file block at offset {offset}"),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("read {got} of {want} bytes"),
                ),
            ));
        }
        buf[want..].fill(0);
        blocks.push(BlockDescriptor::from_padded(
            offset as u32,
            want as u32,
            &buf,
        ));
        offset += want as u64;
    }

    Ok(blocks)
}

/// Read until `buf` is full or the stream ends; returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
