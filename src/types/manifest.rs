//! Manifest and digest types.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Error parsing a digest string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// The digest is not prefixed with a supported algorithm.
    #[error("unsupported digest algorithm in {0:?}, expected \"sha256:\" prefix")]
    UnsupportedAlgorithm(String),
    /// The hash portion is not 64 lowercase hex characters.
    #[error("malformed sha256 hash in {0:?}, expected 64 lowercase hex characters")]
    MalformedHash(String),
}

/// Content-addressable identifier for a manifest or layer.
///
/// Canonical form is `sha256:<64 lowercase hex>`. Validated on construction,
/// so a held `Digest` is always well-formed. Implements `Ord` for
/// deterministic map ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Parse a digest from its canonical string form.
    pub fn from_str(s: &str) -> Result<Self, DigestError> {
        let hash = s
            .strip_prefix("sha256:")
            .ok_or_else(|| DigestError::UnsupportedAlgorithm(s.to_string()))?;
        if hash.len() != 64 || !hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(DigestError::MalformedHash(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Compute the sha256 digest of a byte slice.
    pub fn sha256_of(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        Self(format!("sha256:{}", hex::encode(hash)))
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Digest {
    type Error = DigestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.0
    }
}

/// Error validating a manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// A manifest must reference at least one layer.
    #[error("manifest {0} has an empty layer list")]
    EmptyLayers(Digest),
}

/// Content-addressed description of a container image's layers.
///
/// Immutable once created; identity is the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Digest identifying this manifest.
    pub digest: Digest,
    /// Ordered layer digests.
    pub layers: Vec<Digest>,
}

impl Manifest {
    /// Check structural validity beyond what parsing guarantees.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.layers.is_empty() {
            return Err(ManifestError::EmptyLayers(self.digest.clone()));
        }
        Ok(())
    }
}
