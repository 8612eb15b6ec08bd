// Error taxonomy for signature/patch construction and reconstruction.
//
// Four kinds, matching the operations that can fail:
//   - Io: read/write/seek failures, including truncated reads
//   - Format: malformed signature or patch streams
//   - Verification: reconstructed output hash does not match the header
//   - RemoteFetch: a byte-range request failed or returned non-success
//
// The library reports these as values and never prints; the CLI (or any
// other caller) owns the reporting.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type for all sync engine operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Read/write/seek failure, including a read that came up short of the
    /// expected length.
    #[error("I/O failure{}: {source}", fmt_context(.context))]
    Io {
        /// What the engine was doing when the failure occurred.
        context: String,
        #[source]
        source: io::Error,
    },

    /// A signature or patch stream that cannot be parsed as written.
    #[error("format error: {message}")]
    Format { message: String },

    /// The reconstructed output's content hash does not match the one
    /// recorded in the signature/patch header. The output file is left in
    /// place for inspection.
    #[error(
        "verification failed for {target}: expected hash {}, got {}",
        hex(.expected),
        hex(.actual)
    )]
    Verification {
        /// Identifier of the reconstructed output (path or description).
        target: String,
        /// Hash recorded in the header.
        expected: [u8; 16],
        /// Hash of the bytes actually written.
        actual: [u8; 16],
    },

    /// A remote byte-range request failed or returned a non-success result.
    #[error("range fetch failed for bytes {start}-{end}: {reason}")]
    RemoteFetch {
        /// First byte of the requested inclusive range.
        start: u64,
        /// Last byte of the requested inclusive range.
        end: u64,
        reason: String,
    },
}

impl SyncError {
    /// Wrap an `io::Error` with operation context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Build a `Format` error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }
}

impl From<io::Error> for SyncError {
    fn from(source: io::Error) -> Self {
        Self::Io {
            context: String::new(),
            source,
        }
    }
}

fn fmt_context(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" while {context}")
    }
}

fn hex(bytes: &[u8; 16]) -> String {
    let mut out = String::with_capacity(32);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
