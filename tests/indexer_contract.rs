//! Contract tests for the indexing guarantees.
//!
//! Covers memoized idempotency, single-flight de-duplication under
//! concurrency, state-token invalidation, and shared-failure semantics.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scangate::{
    AffectedManifests, CachingIndexer, Digest, IndexReport, InMemoryIndexer, Indexer, Manifest,
    Package, ServiceError, Vulnerability,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn manifest(seed: &str, layers: &[&str]) -> Manifest {
    Manifest {
        digest: Digest::sha256_of(seed.as_bytes()),
        layers: layers
            .iter()
            .map(|l| Digest::sha256_of(l.as_bytes()))
            .collect(),
    }
}

fn slow_backend() -> InMemoryIndexer {
    let backend = InMemoryIndexer::new();
    backend.add_layer_packages(
        Digest::sha256_of(b"base"),
        vec![Package::new("openssl", "1.0.2"), Package::new("zlib", "1.3.0")],
    );
    backend.set_index_delay(Duration::from_millis(50));
    backend
}

// ─────────────────────────────────────────────────────────────────────────────
// Idempotency and Single-Flight
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sequential_reindex_is_bit_identical() {
    let indexer = CachingIndexer::new(slow_backend());
    let m = manifest("image", &["base"]);

    let first = indexer.index(&m).await.unwrap();
    let second = indexer.index(&m).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(indexer.inner().index_call_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_fifty_concurrent_callers_share_one_computation() {
    let indexer = Arc::new(CachingIndexer::new(slow_backend()));
    let m = manifest("image", &["base"]);

    let mut handles = Vec::new();
    for _ in 0..50 {
        let indexer = Arc::clone(&indexer);
        let m = m.clone();
        handles.push(tokio::spawn(async move { indexer.index(&m).await }));
    }

    let mut reports = Vec::new();
    for handle in handles {
        reports.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(indexer.inner().index_call_count(), 1);
    for report in &reports[1..] {
        assert_eq!(report, &reports[0]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_distinct_digests_index_independently() {
    let indexer = Arc::new(CachingIndexer::new(slow_backend()));

    let a = manifest("image-a", &["base"]);
    let b = manifest("image-b", &["base"]);
    let (ra, rb) = tokio::join!(indexer.index(&a), indexer.index(&b));

    assert_eq!(ra.unwrap().manifest_digest, a.digest);
    assert_eq!(rb.unwrap().manifest_digest, b.digest);
    assert_eq!(indexer.inner().index_call_count(), 2);
}

#[tokio::test]
async fn test_state_upgrade_forces_recompute() {
    let indexer = CachingIndexer::new(slow_backend());
    let m = manifest("image", &["base"]);

    let old = indexer.index(&m).await.unwrap();
    indexer.inner().set_state("algorithm-v2");

    // Stale report no longer served as current.
    assert!(indexer.index_report(&m.digest).await.unwrap().is_none());

    let new = indexer.index(&m).await.unwrap();
    assert_ne!(old.state, new.state);
    assert_eq!(indexer.inner().index_call_count(), 2);

    // Once recomputed, lookups serve the fresh report again.
    assert_eq!(indexer.index_report(&m.digest).await.unwrap(), Some(new));
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure Sharing
// ─────────────────────────────────────────────────────────────────────────────

/// Backend whose first computations fail, to observe error sharing.
struct FlakyIndexer {
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyIndexer {
    fn new(failures: usize) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Indexer for FlakyIndexer {
    async fn index(&self, manifest: &Manifest) -> Result<IndexReport, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Long enough that every spawned caller joins the same flight.
        tokio::time::sleep(Duration::from_millis(200)).await;
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ServiceError::Transient("backend unavailable".to_string()));
        }
        Ok(IndexReport {
            manifest_digest: manifest.digest.clone(),
            state: "flaky-state".to_string(),
            packages: Default::default(),
            success: true,
        })
    }

    async fn index_report(&self, _digest: &Digest) -> Result<Option<IndexReport>, ServiceError> {
        Ok(None)
    }

    async fn state(&self) -> Result<String, ServiceError> {
        Ok("flaky-state".to_string())
    }

    async fn affected_manifests(
        &self,
        _vulnerabilities: &[Vulnerability],
    ) -> Result<AffectedManifests, ServiceError> {
        Ok(AffectedManifests::default())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_callers_share_failure_and_errors_are_not_cached() {
    let indexer = Arc::new(CachingIndexer::new(FlakyIndexer::new(1)));
    let m = manifest("image", &["base"]);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let indexer = Arc::clone(&indexer);
        let m = m.clone();
        handles.push(tokio::spawn(async move { indexer.index(&m).await }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    // One backend computation, one shared transient failure.
    assert_eq!(indexer.inner().calls.load(Ordering::SeqCst), 1);
    assert!(outcomes
        .iter()
        .all(|r| matches!(r, Err(ServiceError::Transient(_)))));

    // The failure was not memoized; a retry reaches the backend and succeeds.
    let report = indexer.index(&m).await.unwrap();
    assert!(report.success);
    assert_eq!(indexer.inner().calls.load(Ordering::SeqCst), 2);
}
