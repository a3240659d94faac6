//! Index Service contract and reference backends.
//!
//! The [`Indexer`] trait is the complete Index Service surface: production
//! and test backends are two variants behind the same interface.
//! [`CachingIndexer`] layers the facade's consistency guarantees over any
//! backend: per-digest single-flight de-duplication, memoization keyed by
//! (digest, state token), and stale-report invalidation.

pub mod caching;
pub mod memory;
pub mod singleflight;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::types::{AffectedManifests, Digest, IndexReport, Manifest, Vulnerability};

/// Contract for the Index Service backend.
///
/// Failure modes: an unknown digest on lookup is a normal `Ok(None)`, not an
/// error; malformed manifests fail with [`ServiceError::Validation`];
/// backend unavailability fails with [`ServiceError::Transient`].
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Compute (or return a cached) index report for the manifest's digest.
    ///
    /// Idempotent: repeated calls with an unchanged manifest and unchanged
    /// state token return an identical report.
    async fn index(&self, manifest: &Manifest) -> Result<IndexReport, ServiceError>;

    /// Look up a previously computed report.
    ///
    /// `Ok(None)` signals the digest has never been indexed, or that the
    /// stored report is stale relative to the current state token; stale
    /// reports are never served as current.
    async fn index_report(&self, digest: &Digest) -> Result<Option<IndexReport>, ServiceError>;

    /// The current indexing-algorithm state token.
    ///
    /// Callers compare this against a report's `state` to detect staleness.
    async fn state(&self) -> Result<String, ServiceError>;

    /// Reverse lookup: manifests whose latest report contains a package
    /// affected by one of the given advisories.
    async fn affected_manifests(
        &self,
        vulnerabilities: &[Vulnerability],
    ) -> Result<AffectedManifests, ServiceError>;
}

pub use caching::CachingIndexer;
pub use memory::InMemoryIndexer;
pub use singleflight::SingleFlight;
