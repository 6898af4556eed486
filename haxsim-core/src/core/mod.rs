//! Core deterministic primitives.
//!
//! Math, binary codec, compression and checksums shared by every other module.

pub mod point;
pub mod codec;
pub mod compress;
pub mod checksum;
pub mod snapshot;

// Re-export core types
pub use point::Point;
pub use codec::{CodecError, CodecResult, Endian, StreamReader, StreamWriter};
pub use checksum::{fold_checksum, ChecksumWriter};
pub use snapshot::SnapshotCache;
