//! Memoization and idempotency layer over any indexer backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::types::{AffectedManifests, Digest, IndexReport, Manifest, Vulnerability};

use super::singleflight::SingleFlight;
use super::Indexer;

/// Caching wrapper providing the facade's indexing guarantees.
///
/// - Concurrent `index` calls for the same digest collapse into one backend
///   computation; all callers observe the same result, success or failure.
/// - Reports are memoized per digest and served only while their state token
///   matches the backend's current token; an algorithm upgrade invalidates
///   them and the next `index` call recomputes.
/// - Failures are never memoized.
pub struct CachingIndexer<I> {
    inner: Arc<I>,
    reports: RwLock<BTreeMap<Digest, IndexReport>>,
    flights: SingleFlight<Digest, Result<IndexReport, ServiceError>>,
}

impl<I: Indexer> CachingIndexer<I> {
    /// Wrap a backend.
    pub fn new(inner: I) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    /// Wrap an already shared backend.
    pub fn from_arc(inner: Arc<I>) -> Self {
        Self {
            inner,
            reports: RwLock::new(BTreeMap::new()),
            flights: SingleFlight::new(),
        }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &Arc<I> {
        &self.inner
    }

    /// Cached report for `digest`, if present and current under `state`.
    fn lookup(&self, digest: &Digest, state: &str) -> Option<IndexReport> {
        self.reports
            .read()
            .get(digest)
            .filter(|report| report.state == state)
            .cloned()
    }
}

#[async_trait]
impl<I: Indexer> Indexer for CachingIndexer<I> {
    async fn index(&self, manifest: &Manifest) -> Result<IndexReport, ServiceError> {
        manifest
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let state = self.inner.state().await?;
        if let Some(report) = self.lookup(&manifest.digest, &state) {
            tracing::debug!(digest = %manifest.digest, "serving memoized index report");
            return Ok(report);
        }

        self.flights
            .run(manifest.digest.clone(), || async {
                // A leader that finished while we contended for the slot
                // already memoized the report.
                if let Some(report) = self.lookup(&manifest.digest, &state) {
                    return Ok(report);
                }
                let report = self.inner.index(manifest).await?;
                self.reports
                    .write()
                    .insert(manifest.digest.clone(), report.clone());
                Ok(report)
            })
            .await
    }

    async fn index_report(&self, digest: &Digest) -> Result<Option<IndexReport>, ServiceError> {
        let state = self.inner.state().await?;
        if let Some(report) = self.lookup(digest, &state) {
            return Ok(Some(report));
        }
        self.inner.index_report(digest).await
    }

    async fn state(&self) -> Result<String, ServiceError> {
        self.inner.state().await
    }

    async fn affected_manifests(
        &self,
        vulnerabilities: &[Vulnerability],
    ) -> Result<AffectedManifests, ServiceError> {
        self.inner.affected_manifests(vulnerabilities).await
    }
}
