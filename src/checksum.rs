//! Content hashing for segment payloads
//!
//! Checksums are lowercase hex SHA-256 digests of the logical (uncompressed)
//! payload, so they stay valid regardless of how the payload is stored.

use sha2::{Digest, Sha256};

/// Length of a hex encoded checksum
pub const CHECKSUM_HEX_LEN: usize = 64;

/// Calculate the SHA-256 checksum of `data` as lowercase hex
pub fn calculate(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check `data` against a previously calculated checksum
pub fn verify(data: &[u8], expected: &str) -> bool {
    calculate(data) == expected
}
