//! Content hashing for snapshot verification.
//!
//! Hashes travel as ASCII strings in the form `"{algorithm}:{hex_digest}"`,
//! e.g. `sha256:<64 hex chars>`. Comparison is exact equality only — drift
//! detection has no notion of similarity. Equality is evaluated in constant
//! time so that verification cost never depends on where two digests
//! diverge.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Algorithm label used for all locally computed hashes.
pub const HASH_ALGORITHM: &str = "sha256";

/// Hashes raw content, returning `"sha256:<hex>"`.
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(HASH_ALGORITHM.len() + 1 + digest.len() * 2);
    out.push_str(HASH_ALGORITHM);
    out.push(':');
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Compares two hash strings for exact equality in constant time.
///
/// Strings of different lengths compare unequal; no partial or
/// prefix-based matching is performed.
#[must_use]
pub fn hashes_match(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}

/// Checks that a hash string has the `"{algorithm}:{hex}"` shape.
///
/// The algorithm label must be non-empty lowercase ASCII alphanumerics and
/// the digest must be non-empty lowercase hex.
#[must_use]
pub fn is_well_formed(hash: &str) -> bool {
    let Some((algorithm, digest)) = hash.split_once(':') else {
        return false;
    };
    if algorithm.is_empty() || digest.is_empty() {
        return false;
    }
    let algorithm_ok = algorithm
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    let digest_ok = digest
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    algorithm_ok && digest_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes_format() {
        let hash = hash_bytes(b"hello world");
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), "sha256:".len() + 64);

        // Deterministic
        assert_eq!(hash, hash_bytes(b"hello world"));

        // Content-sensitive
        assert_ne!(hash, hash_bytes(b"different"));
    }

    #[test]
    fn test_hashes_match_exact_only() {
        let hash = hash_bytes(b"content");
        assert!(hashes_match(&hash, &hash));

        // A prefix is not a match
        assert!(!hashes_match(&hash, &hash[..hash.len() - 1]));

        let other = hash_bytes(b"other content");
        assert!(!hashes_match(&hash, &other));
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed(&hash_bytes(b"x")));
        assert!(is_well_formed("sha256:abcdef0123"));

        assert!(!is_well_formed("sha256"));
        assert!(!is_well_formed(":abcdef"));
        assert!(!is_well_formed("sha256:"));
        assert!(!is_well_formed("sha256:ABCDEF"));
        assert!(!is_well_formed("sha256:xyz"));
        assert!(!is_well_formed("SHA256:abcdef"));
    }
}
