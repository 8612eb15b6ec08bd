// Hash primitives for block-level delta sync.
//
// This module provides:
// - The Adler-style rolling weak checksum (cheap pre-filter)
// - The 64-bit streaming strong hash with ring-aware addressing
// - The whole-file MD5 content hash used for final verification
// - The weak-sum index and presence table driving the matcher

pub mod file;
pub mod strong;
pub mod table;
pub mod weak;
