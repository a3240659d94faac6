//! Canonical serialization for deterministic fingerprints.
//!
//! Update operations fingerprint the vulnerability set they ingested, and
//! the indexer derives its state token from its algorithm description; both
//! need byte-stable serialization of the same input.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable Vec order: vectors serialize in index order
//! - No HashMap allowed: use BTreeMap for maps in fingerprinted data

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for fingerprinting.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonical serialization failed")
}

/// Compute the canonical fingerprint of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Compute the canonical fingerprint and return it as a hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Severity, Vulnerability};

    fn advisory(id: &str) -> Vulnerability {
        Vulnerability {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            severity: Severity::Low,
            updater: "osv".to_string(),
            package_name: "openssl".to_string(),
            ranges: vec![],
            fixed_in: None,
        }
    }

    #[test]
    fn test_same_set_same_fingerprint() {
        let set = vec![advisory("CVE-2024-0001"), advisory("CVE-2024-0002")];
        assert_eq!(canonical_hash_hex(&set), canonical_hash_hex(&set));
    }

    #[test]
    fn test_different_sets_differ() {
        let a = vec![advisory("CVE-2024-0001")];
        let b = vec![advisory("CVE-2024-0002")];
        assert_ne!(canonical_hash_hex(&a), canonical_hash_hex(&b));
    }
}
