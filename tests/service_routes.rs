//! Routing tests for the scangate facade.
//!
//! These tests verify that each mode registers exactly its declared routes,
//! that registration does not depend on data presence, and that the
//! taxonomy's statuses come back on the wire.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

use scangate::service::{create_router, Mode, ServiceState, LATEST_UPDATE_OPERATION_HEADER};
use scangate::{
    AffectedManifests, CachingIndexer, Digest, IndexReport, InMemoryIndexer, InMemoryMatcher,
    Indexer, Manifest, Matcher, Package, ServiceError, Severity, UpdateDiff, UpdateOperation,
    VersionRange, Vulnerability, VulnerabilityReport,
};

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backends
// ─────────────────────────────────────────────────────────────────────────────

/// Indexer that returns empty data for every operation.
struct MockIndexer;

#[async_trait]
impl Indexer for MockIndexer {
    async fn index(&self, manifest: &Manifest) -> Result<IndexReport, ServiceError> {
        Ok(IndexReport {
            manifest_digest: manifest.digest.clone(),
            state: String::new(),
            packages: BTreeMap::new(),
            success: true,
        })
    }

    async fn index_report(&self, _digest: &Digest) -> Result<Option<IndexReport>, ServiceError> {
        Ok(None)
    }

    async fn state(&self) -> Result<String, ServiceError> {
        Ok(String::new())
    }

    async fn affected_manifests(
        &self,
        _vulnerabilities: &[Vulnerability],
    ) -> Result<AffectedManifests, ServiceError> {
        Ok(AffectedManifests::default())
    }
}

/// Matcher that returns empty data for every operation.
struct MockMatcher;

#[async_trait]
impl Matcher for MockMatcher {
    async fn scan(&self, report: &IndexReport) -> Result<VulnerabilityReport, ServiceError> {
        Ok(VulnerabilityReport {
            manifest_digest: report.manifest_digest.clone(),
            packages: BTreeMap::new(),
            vulnerabilities: BTreeMap::new(),
            package_vulnerabilities: BTreeMap::new(),
        })
    }

    async fn update_operations(
        &self,
        _updaters: &[String],
    ) -> Result<BTreeMap<String, Vec<UpdateOperation>>, ServiceError> {
        Ok(BTreeMap::new())
    }

    async fn latest_update_operation(&self) -> Result<Option<Uuid>, ServiceError> {
        Ok(None)
    }

    async fn latest_update_operations(&self) -> Result<BTreeMap<String, Uuid>, ServiceError> {
        Ok(BTreeMap::new())
    }

    async fn update_diff(&self, prev: Uuid, _cur: Uuid) -> Result<UpdateDiff, ServiceError> {
        Err(ServiceError::NotFound(format!("update operation {prev}")))
    }

    async fn delete_update_operations(&self, _ids: &[Uuid]) -> Result<u64, ServiceError> {
        Ok(0)
    }
}

fn mock_router(mode: Mode) -> Router {
    let indexer: Option<Arc<dyn Indexer>> = mode
        .serves_indexer()
        .then(|| Arc::new(MockIndexer) as Arc<dyn Indexer>);
    let matcher: Option<Arc<dyn Matcher>> = mode
        .serves_matcher()
        .then(|| Arc::new(MockMatcher) as Arc<dyn Matcher>);
    create_router(ServiceState::new(mode, indexer, matcher).unwrap())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(router: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn sample_digest() -> String {
    Digest::sha256_of(b"manifest").to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Route Registration Per Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Registering the update-operation route must not depend on data presence.
#[tokio::test]
async fn test_update_operations_ok_with_empty_backends() {
    for mode in [Mode::MatcherOnly, Mode::Combined] {
        let router = mock_router(mode);
        let (status, body) = get(&router, "/update_operation").await;
        assert_eq!(status, StatusCode::OK, "mode {mode}");
        assert_eq!(body, "{}");
    }
}

#[tokio::test]
async fn test_update_operations_latest_view_ok_when_empty() {
    let router = mock_router(Mode::Combined);
    let (status, body) = get(&router, "/update_operation?latest=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "{}");
}

/// In IndexerOnly mode the matcher routes do not exist at all.
#[tokio::test]
async fn test_indexer_only_does_not_register_matcher_routes() {
    let router = mock_router(Mode::IndexerOnly);
    let (status, _) = get(&router, "/update_operation").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&router, "/update_diff?prev=a&cur=b").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&router, "POST", "/vulnerability_report", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_matcher_only_does_not_register_indexer_routes() {
    let router = mock_router(Mode::MatcherOnly);
    let (status, _) = send_json(&router, "POST", "/index_report", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&router, &format!("/index_report/{}", sample_digest())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_index_state_routed_only_with_indexer() {
    let (status, body) = get(&mock_router(Mode::IndexerOnly), "/index_state").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("state"));

    let (status, _) = get(&mock_router(Mode::MatcherOnly), "/index_state").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_responds_in_every_mode() {
    for mode in [Mode::IndexerOnly, Mode::MatcherOnly, Mode::Combined] {
        let router = mock_router(mode);
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(mode.name()));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status Codes On The Wire
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_index_report_lookup_not_found() {
    let router = mock_router(Mode::Combined);
    let (status, body) = get(&router, &format!("/index_report/{}", sample_digest())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not_found"));
}

#[tokio::test]
async fn test_index_report_lookup_malformed_digest() {
    let router = mock_router(Mode::Combined);
    let (status, body) = get(&router, "/index_report/not-a-digest").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("validation"));
}

#[tokio::test]
async fn test_index_manifest_created() {
    let router = mock_router(Mode::IndexerOnly);
    let manifest = serde_json::json!({
        "digest": sample_digest(),
        "layers": [Digest::sha256_of(b"layer").to_string()],
    });
    let (status, _) = send_json(&router, "POST", "/index_report", &manifest.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_index_rejects_malformed_manifest_body() {
    let router = mock_router(Mode::IndexerOnly);
    let (status, body) = send_json(&router, "POST", "/index_report", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("validation"));
}

#[tokio::test]
async fn test_index_rejects_empty_layer_list() {
    let indexer = Arc::new(CachingIndexer::new(InMemoryIndexer::new()));
    let router = create_router(
        ServiceState::new(Mode::IndexerOnly, Some(indexer as Arc<dyn Indexer>), None).unwrap(),
    );

    let manifest = serde_json::json!({ "digest": sample_digest(), "layers": [] });
    let (status, body) = send_json(&router, "POST", "/index_report", &manifest.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("empty layer list"));
}

#[tokio::test]
async fn test_affected_manifest_rejects_empty_set() {
    let router = mock_router(Mode::IndexerOnly);
    let (status, _) = send_json(
        &router,
        "GET",
        "/internal/affected_manifest",
        r#"{"vulnerabilities": []}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_diff_malformed_and_missing_ids() {
    let router = mock_router(Mode::MatcherOnly);

    let (status, _) = get(&router, "/update_diff?prev=not-a-uuid&cur=also-not").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&router, "/update_diff").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = Uuid::new_v4();
    let (status, _) = get(
        &router,
        &format!("/update_diff?prev={unknown}&cur={unknown}"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_update_operation_statuses() {
    let router = mock_router(Mode::MatcherOnly);

    let (status, _) = send_json(&router, "DELETE", "/update_operation/not-a-uuid", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        &router,
        "DELETE",
        &format!("/update_operation/{}", Uuid::new_v4()),
        "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"deleted\":0"));
}

#[tokio::test]
async fn test_unknown_updater_history_not_found() {
    let router = mock_router(Mode::MatcherOnly);
    let (status, _) = get(&router, "/update_operation/osv").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─────────────────────────────────────────────────────────────────────────────
// End To End Over Real Backends
// ─────────────────────────────────────────────────────────────────────────────

fn advisory(id: &str, package: &str, fixed: &str) -> Vulnerability {
    Vulnerability {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        severity: Severity::Critical,
        updater: "osv".to_string(),
        package_name: package.to_string(),
        ranges: vec![VersionRange {
            introduced: None,
            fixed: Some(fixed.to_string()),
        }],
        fixed_in: Some(fixed.to_string()),
    }
}

#[tokio::test]
async fn test_combined_index_then_scan_flow() {
    let backend = InMemoryIndexer::new();
    backend.add_layer_packages(
        Digest::sha256_of(b"base-layer"),
        vec![Package::new("openssl", "1.0.2")],
    );
    let indexer = Arc::new(CachingIndexer::new(backend));

    let matcher = Arc::new(InMemoryMatcher::new());
    matcher.set_index_state(indexer.state().await.unwrap());
    let recorded = matcher
        .log()
        .record("osv", vec![advisory("CVE-2024-0001", "openssl", "1.0.5")]);

    let router = create_router(
        ServiceState::new(
            Mode::Combined,
            Some(indexer as Arc<dyn Indexer>),
            Some(Arc::clone(&matcher) as Arc<dyn Matcher>),
        )
        .unwrap(),
    );

    // Index a manifest containing the vulnerable layer.
    let manifest = serde_json::json!({
        "digest": Digest::sha256_of(b"image").to_string(),
        "layers": [Digest::sha256_of(b"base-layer").to_string()],
    });
    let (status, body) = send_json(&router, "POST", "/index_report", &manifest.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);
    let report: IndexReport = serde_json::from_str(&body).unwrap();
    assert_eq!(report.packages.len(), 1);

    // Lookup serves the memoized report.
    let (status, _) = get(
        &router,
        &format!("/index_report/{}", report.manifest_digest),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Scan the report against the seeded advisory.
    let (status, body) =
        send_json(&router, "POST", "/vulnerability_report", &body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let scanned: VulnerabilityReport = serde_json::from_str(&body).unwrap();
    assert!(scanned.vulnerabilities.contains_key("CVE-2024-0001"));

    // The history endpoints agree on the recorded operation.
    let (status, body) = get(&router, "/update_operation").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&recorded.id.to_string()));

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/update_operation?latest=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let heartbeat = response
        .headers()
        .get(LATEST_UPDATE_OPERATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(heartbeat, Some(recorded.id.to_string()));

    // Reverse lookup names the indexed manifest.
    let query = serde_json::json!({
        "vulnerabilities": [advisory("CVE-2024-0001", "openssl", "1.0.5")],
    });
    let (status, body) = send_json(
        &router,
        "GET",
        "/internal/affected_manifest",
        &query.to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&report.manifest_digest.to_string()));
}

#[tokio::test]
async fn test_scan_with_stale_state_conflicts() {
    let matcher = Arc::new(InMemoryMatcher::with_index_state("current-token"));
    let router = create_router(
        ServiceState::new(Mode::MatcherOnly, None, Some(matcher as Arc<dyn Matcher>)).unwrap(),
    );

    let stale = serde_json::json!({
        "manifest_digest": Digest::sha256_of(b"image").to_string(),
        "state": "previous-token",
        "packages": {},
        "success": true,
    });
    let (status, body) =
        send_json(&router, "POST", "/vulnerability_report", &stale.to_string()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("stale_index_state"));
}
