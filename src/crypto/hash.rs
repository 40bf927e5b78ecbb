//! Hashing utilities for the wire protocol
//!
//! Bitcoin frames carry a 4-byte checksum taken from a double SHA-256
//! digest of the payload.

use sha2::{Digest, Sha256};

/// Size of the frame checksum in bytes
pub const CHECKSUM_SIZE: usize = 4;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Frame checksum: the first 4 bytes of `sha256(sha256(payload))`
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let digest = double_sha256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        assert_eq!(
            hex::encode(sha256(data)),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_double_sha256() {
        let data = b"hello world";
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn test_empty_payload_checksum() {
        // Every empty-payload message (verack, sendaddrv2, ...) carries this checksum
        assert_eq!(checksum(&[]), [0x5d, 0xf6, 0xe0, 0xe2]);
    }

    #[test]
    fn test_checksum_is_digest_prefix() {
        let payload = [0x01, 0x02, 0x03, 0x04];
        let digest = double_sha256(&payload);
        assert_eq!(checksum(&payload)[..], digest[..CHECKSUM_SIZE]);
    }

    #[test]
    fn test_checksum_changes_with_payload() {
        assert_ne!(checksum(b"version"), checksum(b"versioN"));
    }
}
