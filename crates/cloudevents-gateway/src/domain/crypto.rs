//! One-way salted digest used for every stored and presented credential.

use sha2::{Digest, Sha256};

/// Length of a rendered digest (SHA-256 as lowercase hex).
pub const HASH_HEX_LEN: usize = 64;

/// Returns the SHA-256 digest of `input` as lowercase hex.
///
/// When `salt` is non-empty the digested input is `"{salt}:{input}"`,
/// otherwise it is `input` alone.
pub fn hash(salt: &str, input: &str) -> String {
    let mut hasher = Sha256::new();
    if !salt.is_empty() {
        hasher.update(salt.as_bytes());
        hasher.update(b":");
    }
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison to prevent timing attacks
///
/// SECURITY: This function takes the same amount of time regardless of how
/// many characters match. Lengths are compared in constant time as well.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    // Different pad values guarantee a mismatch when lengths differ
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
