//! State Checksum
//!
//! Folded-XOR checksum of a serialized room, exchanged between peers to detect
//! desyncs. Field write order is fixed by the serializer, so equal states fold
//! to equal checksums on every peer.

use sha2::{Digest, Sha256};

/// Digest type for content fingerprints (256 bits / 32 bytes)
pub type Fingerprint = [u8; 32];

/// Incremental XOR folder over 4-byte little-endian words.
#[derive(Debug, Clone, Default)]
pub struct ChecksumWriter {
    acc: u32,
    pending: [u8; 4],
    pending_len: usize,
}

impl ChecksumWriter {
    /// Create an empty folder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the fold.
    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.pending[self.pending_len] = b;
            self.pending_len += 1;
            if self.pending_len == 4 {
                self.acc ^= u32::from_le_bytes(self.pending);
                self.pending = [0; 4];
                self.pending_len = 0;
            }
        }
    }

    /// Finish, zero-padding any trailing partial word.
    pub fn finalize(mut self) -> u32 {
        if self.pending_len > 0 {
            for b in &mut self.pending[self.pending_len..] {
                *b = 0;
            }
            self.acc ^= u32::from_le_bytes(self.pending);
        }
        self.acc
    }
}

/// Fold a complete buffer.
pub fn fold_checksum(bytes: &[u8]) -> u32 {
    let mut writer = ChecksumWriter::new();
    writer.update(bytes);
    writer.finalize()
}

/// SHA-256 of arbitrary data.
pub fn fingerprint(data: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_words() {
        let bytes = [1, 0, 0, 0, 2, 0, 0, 0];
        assert_eq!(fold_checksum(&bytes), 3);
    }

    #[test]
    fn test_fold_trailing_padding() {
        // 0x00000001 ^ 0x00000302
        assert_eq!(fold_checksum(&[1, 0, 0, 0, 2, 3]), 0x0000_0303);
    }

    #[test]
    fn test_incremental_matches_bulk() {
        let data: Vec<u8> = (0..37u8).collect();
        let mut w = ChecksumWriter::new();
        w.update(&data[..5]);
        w.update(&data[5..22]);
        w.update(&data[22..]);
        assert_eq!(w.finalize(), fold_checksum(&data));
    }

    #[test]
    fn test_fingerprint_stable() {
        assert_eq!(fingerprint(b"Classic"), fingerprint(b"Classic"));
        assert_ne!(fingerprint(b"Classic"), fingerprint(b"Hockey"));
    }
}
