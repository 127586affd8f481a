//! CRC-64 trailer checksums for the binary formats.

use crc::{Crc, CRC_64_GO_ISO};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Incremental CRC-64 digest, fed alongside every write so files are
/// checksummed without a second pass.
pub struct Digest {
    inner: crc::Digest<'static, u64>,
}

impl Digest {
    pub fn new() -> Self {
        Digest { inner: CRC64.digest() }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> u64 {
        self.inner.finalize()
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot checksum over a byte slice.
pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_matches_one_shot() {
        let data: Vec<u8> = (0u8..=255).collect();
        let mut digest = Digest::new();
        for chunk in data.chunks(7) {
            digest.update(chunk);
        }
        assert_eq!(digest.finalize(), checksum(&data));
    }

    #[test]
    fn detects_single_bit_flip() {
        let mut data = vec![0x5au8; 64];
        let before = checksum(&data);
        data[20] ^= 1;
        assert_ne!(before, checksum(&data));
    }
}
