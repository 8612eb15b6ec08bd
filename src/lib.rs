//! Blocksync: block-based binary delta sync.
//!
//! Given an old and a new version of a file, the engine describes how to
//! rebuild the new one from blocks the old file already contains plus a
//! minimal remainder. Two delivery modes share one rolling-checksum
//! matching algorithm:
//!
//! - **Signature mode** (`signature` + `sync`): only per-block checksums of
//!   the new file travel; the receiver copies matched regions from its old
//!   file and range-fetches the rest through a [`fetch::RangeFetcher`].
//! - **Patch mode** (`patch`): unmatched regions are embedded verbatim in a
//!   self-contained patch file, applied without any network access.
//!
//! File-oriented helpers live in [`io`]; an optional CLI sits behind the
//! `cli` feature.
//!
//! # Quick Start
//!
//! ```
//! use std::io::Cursor;
//! use blocksync::patch;
//!
//! let old = b"the quick brown fox jumps over the lazy dog".to_vec();
//! let new = b"the quick red fox jumps over the lazy dog!".to_vec();
//!
//! let mut delta = Vec::new();
//! patch::build_patch(&mut Cursor::new(&new), &mut Cursor::new(&old), &mut delta).unwrap();
//!
//! let mut rebuilt = Cursor::new(Vec::new());
//! patch::apply_patch(&mut Cursor::new(&old), &mut Cursor::new(&delta), &mut rebuilt).unwrap();
//! assert_eq!(rebuilt.into_inner(), new);
//! ```

pub mod block;
pub mod error;
pub mod fetch;
pub mod format;
pub mod hash;
pub mod io;
pub mod matcher;
pub mod patch;
pub mod ring;
pub mod signature;
pub mod sync;

#[cfg(feature = "cli")]
pub mod cli;

pub use block::{BlockDescriptor, block_size_for};
pub use error::{Result, SyncError};
pub use fetch::{ByteRange, RangeFetcher};
pub use format::SyncHeader;
pub use signature::Signature;
