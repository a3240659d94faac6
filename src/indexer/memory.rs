//! In-memory indexer backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::canonical::canonical_hash_hex;
use crate::error::ServiceError;
use crate::types::{AffectedManifests, Digest, IndexReport, Manifest, Package, Vulnerability};
use crate::INDEXER_ALGORITHM_VERSION;

use super::Indexer;

/// In-memory indexer backend.
///
/// Package extraction stays out of scope: inventories are registered per
/// layer with [`add_layer_packages`], and indexing a manifest unions the
/// inventories of its layers. Uses `BTreeMap` for deterministic report
/// contents. Memoization and single-flight live in
/// [`CachingIndexer`](super::CachingIndexer), not here; this backend
/// recomputes on every call and counts those computations for tests.
#[derive(Debug, Default)]
pub struct InMemoryIndexer {
    /// Registered package inventory per layer digest.
    layers: RwLock<BTreeMap<Digest, Vec<Package>>>,
    /// Latest computed report per manifest digest.
    reports: RwLock<BTreeMap<Digest, IndexReport>>,
    /// Current algorithm state token.
    state: RwLock<String>,
    /// Number of `index` computations performed.
    index_calls: AtomicUsize,
    /// Artificial per-index delay, to make races observable in tests.
    index_delay: RwLock<Option<Duration>>,
}

impl InMemoryIndexer {
    /// Create an empty backend at the current algorithm version.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(default_state_token()),
            ..Self::default()
        }
    }

    /// Register the package inventory of a layer.
    pub fn add_layer_packages(&self, layer: Digest, packages: Vec<Package>) {
        self.layers.write().insert(layer, packages);
    }

    /// Replace the algorithm state token, simulating an algorithm upgrade.
    ///
    /// Reports computed under the previous token become stale.
    pub fn set_state(&self, token: impl Into<String>) {
        *self.state.write() = token.into();
    }

    /// Slow down `index` computations.
    pub fn set_index_delay(&self, delay: Duration) {
        *self.index_delay.write() = Some(delay);
    }

    /// Number of `index` computations performed so far.
    pub fn index_call_count(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }
}

/// State token for the current in-memory extraction algorithm.
fn default_state_token() -> String {
    canonical_hash_hex(&("scangate-memory-indexer", INDEXER_ALGORITHM_VERSION))
}

#[async_trait]
impl Indexer for InMemoryIndexer {
    async fn index(&self, manifest: &Manifest) -> Result<IndexReport, ServiceError> {
        manifest
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.index_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().clone();
        let mut packages = BTreeMap::new();
        {
            let layers = self.layers.read();
            for layer in &manifest.layers {
                for package in layers.get(layer).into_iter().flatten() {
                    packages.insert(package.id.clone(), package.clone());
                }
            }
        }

        let report = IndexReport {
            manifest_digest: manifest.digest.clone(),
            state,
            packages,
            success: true,
        };
        self.reports
            .write()
            .insert(manifest.digest.clone(), report.clone());
        Ok(report)
    }

    async fn index_report(&self, digest: &Digest) -> Result<Option<IndexReport>, ServiceError> {
        let current = self.state.read().clone();
        let reports = self.reports.read();
        Ok(reports
            .get(digest)
            .filter(|report| report.state == current)
            .cloned())
    }

    async fn state(&self) -> Result<String, ServiceError> {
        Ok(self.state.read().clone())
    }

    async fn affected_manifests(
        &self,
        vulnerabilities: &[Vulnerability],
    ) -> Result<AffectedManifests, ServiceError> {
        let reports = self.reports.read();
        let mut affected = AffectedManifests::default();
        for vuln in vulnerabilities {
            affected
                .vulnerabilities
                .insert(vuln.id.clone(), vuln.clone());
            // reports iterate in digest order, keeping the result ordered
            let digests: Vec<Digest> = reports
                .values()
                .filter(|report| report.affected_package(vuln).is_some())
                .map(|report| report.manifest_digest.clone())
                .collect();
            if !digests.is_empty() {
                affected.vulnerable_manifests.insert(vuln.id.clone(), digests);
            }
        }
        Ok(affected)
    }
}
