//! Keyed-hash helpers shared by the gateway adapters.

use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn sha512_hex(data: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Constant-time equality over the byte representations. Length mismatch
/// still folds every byte so timing does not leak the prefix length.
pub fn secure_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Canonicalize fields as alphabetically sorted `key=value` pairs joined
/// with `&`, append the salt, and hash. BTreeMap iteration order gives the
/// sort for free.
pub fn sorted_pair_digest(fields: &BTreeMap<String, String>, salt: &str) -> String {
    let canonical: Vec<String> = fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    let payload = format!("{}{}", canonical.join("&"), salt);
    sha256_hex(payload.as_bytes())
}

/// Canonicalize values as a fixed pipe-delimited sequence with the salt as
/// the final segment, hashed with SHA-512.
pub fn pipe_digest(segments: &[&str], salt: &str) -> String {
    let mut payload = segments.join("|");
    payload.push('|');
    payload.push_str(salt);
    sha512_hex(payload.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_eq_matches_and_rejects() {
        assert!(secure_eq("abc123", "abc123"));
        assert!(!secure_eq("abc123", "abc124"));
        assert!(!secure_eq("abc", "abc123"));
        assert!(secure_eq("", ""));
    }

    #[test]
    fn sorted_pair_digest_is_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("amount".to_string(), "250".to_string());
        a.insert("transactionId".to_string(), "TXN1".to_string());

        let mut b = BTreeMap::new();
        b.insert("transactionId".to_string(), "TXN1".to_string());
        b.insert("amount".to_string(), "250".to_string());

        assert_eq!(sorted_pair_digest(&a, "salt"), sorted_pair_digest(&b, "salt"));
    }

    #[test]
    fn sorted_pair_digest_changes_with_salt() {
        let mut fields = BTreeMap::new();
        fields.insert("amount".to_string(), "250".to_string());
        assert_ne!(
            sorted_pair_digest(&fields, "salt-a"),
            sorted_pair_digest(&fields, "salt-b")
        );
    }

    #[test]
    fn pipe_digest_appends_salt_as_last_segment() {
        let direct = sha512_hex(b"key|TXN1|250|salt");
        assert_eq!(pipe_digest(&["key", "TXN1", "250"], "salt"), direct);
    }
}
