// Whole-file content hash.
//
// MD5, used purely for end-to-end integrity verification after
// reconstruction (content addressing, not security). Streamed in 64 KiB
// chunks so arbitrarily large files never sit in memory.

use std::io::{self, Read};

use md5::{Digest, Md5};

const BUF_SIZE: usize = 64 * 1024;

/// Hash everything remaining in `reader`.
///
/// Returns the 16-byte digest and the number of bytes consumed.
pub fn file_hash<R: Read + ?Sized>(reader: &mut R) -> io::Result<([u8; 16], u64)> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; BUF_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hasher.finalize().into(), total))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
