//! Keccak-256 helpers.

use photonx_common::Hash;
use sha3::{Digest, Keccak256};

/// Compute the keccak-256 digest of a byte slice.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// Compute the keccak-256 digest of the concatenation of several slices
/// without materializing the joined buffer.
pub fn keccak256_concat<'a, I>(parts: I) -> Hash
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        // Well-known keccak-256 of the empty string.
        assert_eq!(
            keccak256(b"").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_concat_matches_joined() {
        let joined = keccak256(b"hello world");
        let parts = keccak256_concat([b"hello ".as_slice(), b"world".as_slice()]);
        assert_eq!(joined, parts);
    }
}
