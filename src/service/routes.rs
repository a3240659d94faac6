//! Axum routes for the scangate facade.

use axum::{
    extract::rejection::JsonRejection,
    extract::{Json, Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::indexer::Indexer;
use crate::matcher::Matcher;
use crate::types::{
    AffectedManifests, Digest, IndexReport, Manifest, UpdateDiff, UpdateOperation, Vulnerability,
    VulnerabilityReport,
};

use super::state::{Backends, Mode, ServiceState};

/// Index a manifest.
pub const INDEX_REPORT_API_PATH: &str = "/index_report";
/// Look up an index report by manifest digest.
pub const INDEX_REPORT_DIGEST_API_PATH: &str = "/index_report/:digest";
/// Reverse lookup from vulnerabilities to affected manifests.
pub const AFFECTED_MANIFEST_API_PATH: &str = "/internal/affected_manifest";
/// Current indexing-algorithm state token.
pub const INDEX_STATE_API_PATH: &str = "/index_state";
/// Match an index report against the active vulnerability set.
pub const VULNERABILITY_REPORT_API_PATH: &str = "/vulnerability_report";
/// Update-operation histories (`?latest=true` for the latest-pointer view).
pub const UPDATE_OPERATION_API_PATH: &str = "/update_operation";
/// One updater's history (GET) or one operation's deletion (DELETE).
pub const UPDATE_OPERATION_REF_API_PATH: &str = "/update_operation/:ref";
/// Added/removed vulnerabilities between two operations.
pub const UPDATE_DIFF_API_PATH: &str = "/update_diff";
/// Process health.
pub const HEALTH_API_PATH: &str = "/health";

/// Response header carrying the globally most recent operation id.
pub const LATEST_UPDATE_OPERATION_HEADER: &str = "x-latest-update-operation";

impl Mode {
    /// The complete, fixed route list for this mode.
    ///
    /// Each logical operation maps to exactly one (method, path) pair; no
    /// path is registered twice and no operation of a configured backend is
    /// left unroutable.
    pub fn endpoints(&self) -> Vec<(&'static str, &'static str)> {
        let mut endpoints = vec![("GET", HEALTH_API_PATH)];
        if self.serves_indexer() {
            endpoints.extend([
                ("POST", INDEX_REPORT_API_PATH),
                ("GET", INDEX_REPORT_DIGEST_API_PATH),
                ("GET", AFFECTED_MANIFEST_API_PATH),
                ("GET", INDEX_STATE_API_PATH),
            ]);
        }
        if self.serves_matcher() {
            endpoints.extend([
                ("POST", VULNERABILITY_REPORT_API_PATH),
                ("GET", UPDATE_OPERATION_API_PATH),
                ("GET", UPDATE_OPERATION_REF_API_PATH),
                ("DELETE", UPDATE_OPERATION_REF_API_PATH),
                ("GET", UPDATE_DIFF_API_PATH),
            ]);
        }
        endpoints
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the affected-manifest reverse lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedManifestsRequest {
    /// The vulnerabilities to resolve against previously indexed manifests.
    pub vulnerabilities: Vec<Vulnerability>,
}

/// Query selecting which update-operation view to return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOperationQuery {
    /// When true, return only the per-updater latest pointers.
    #[serde(default)]
    pub latest: bool,
}

/// Query naming the two operations to diff.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDiffQuery {
    /// The older operation id.
    pub prev: Option<String>,
    /// The newer operation id.
    pub cur: Option<String>,
}

/// Response for an operation deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// How many of the named operations existed and were removed.
    pub deleted: u64,
}

/// Response carrying the indexer's current state token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStateResponse {
    /// The current indexing-algorithm state token.
    pub state: String,
}

/// Service health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok" for a serving process.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Configured mode name.
    pub mode: String,
}

/// Structured error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error kind.
    pub code: String,
}

type ErrorReply = (StatusCode, Json<ErrorResponse>);

/// Normalize a backend error to its wire form.
///
/// The taxonomy maps onto fixed statuses; internal backend error types never
/// reach the wire.
fn error_reply(err: ServiceError) -> ErrorReply {
    let status = match &err {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Stale { .. } => StatusCode::CONFLICT,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(code = err.code(), error = %err, "request error");
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

/// Unwrap a JSON body, mapping rejections to the validation kind.
fn require_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ErrorReply> {
    let Json(value) =
        payload.map_err(|e| error_reply(ServiceError::Validation(e.body_text())))?;
    Ok(value)
}

// ============================================================================
// Index Service Handlers
// ============================================================================

/// Compute (or return the memoized) index report for a manifest.
async fn index_handler(
    State(indexer): State<Arc<dyn Indexer>>,
    payload: Result<Json<Manifest>, JsonRejection>,
) -> Result<(StatusCode, Json<IndexReport>), ErrorReply> {
    let manifest = require_json(payload)?;
    let report = indexer.index(&manifest).await.map_err(error_reply)?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// Look up a previously computed index report.
async fn index_report_handler(
    State(indexer): State<Arc<dyn Indexer>>,
    Path(digest): Path<String>,
) -> Result<Json<IndexReport>, ErrorReply> {
    let digest = Digest::from_str(&digest)
        .map_err(|e| error_reply(ServiceError::Validation(e.to_string())))?;
    let report = indexer.index_report(&digest).await.map_err(error_reply)?;
    match report {
        Some(report) => Ok(Json(report)),
        None => Err(error_reply(ServiceError::NotFound(format!(
            "index report for {digest}"
        )))),
    }
}

/// Resolve a vulnerability set against previously indexed manifests.
async fn affected_manifests_handler(
    State(indexer): State<Arc<dyn Indexer>>,
    payload: Result<Json<AffectedManifestsRequest>, JsonRejection>,
) -> Result<Json<AffectedManifests>, ErrorReply> {
    let request = require_json(payload)?;
    if request.vulnerabilities.is_empty() {
        return Err(error_reply(ServiceError::Validation(
            "vulnerability set is empty".to_string(),
        )));
    }
    let affected = indexer
        .affected_manifests(&request.vulnerabilities)
        .await
        .map_err(error_reply)?;
    Ok(Json(affected))
}

/// The current indexing-algorithm state token.
///
/// Callers poll this to detect when previously cached reports went stale.
async fn index_state_handler(
    State(indexer): State<Arc<dyn Indexer>>,
) -> Result<Json<IndexStateResponse>, ErrorReply> {
    let state = indexer.state().await.map_err(error_reply)?;
    Ok(Json(IndexStateResponse { state }))
}

// ============================================================================
// Match Service Handlers
// ============================================================================

/// Match an index report against the active vulnerability set.
async fn vulnerability_report_handler(
    State(matcher): State<Arc<dyn Matcher>>,
    payload: Result<Json<IndexReport>, JsonRejection>,
) -> Result<Json<VulnerabilityReport>, ErrorReply> {
    let report = require_json(payload)?;
    let scanned = matcher.scan(&report).await.map_err(error_reply)?;
    Ok(Json(scanned))
}

/// Update-operation histories, or the latest-pointer view.
///
/// Responds 200 whenever the matcher is configured, data or not; the
/// freshness heartbeat rides along as a response header.
async fn update_operations_handler(
    State(matcher): State<Arc<dyn Matcher>>,
    Query(query): Query<UpdateOperationQuery>,
) -> Result<Response, ErrorReply> {
    let mut response = if query.latest {
        let latest = matcher
            .latest_update_operations()
            .await
            .map_err(error_reply)?;
        Json(latest).into_response()
    } else {
        let histories = matcher.update_operations(&[]).await.map_err(error_reply)?;
        Json(histories).into_response()
    };

    let heartbeat = matcher
        .latest_update_operation()
        .await
        .map_err(error_reply)?;
    if let Some(id) = heartbeat {
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            response
                .headers_mut()
                .insert(LATEST_UPDATE_OPERATION_HEADER, value);
        }
    }
    Ok(response)
}

/// One updater's operation history, most recent first.
async fn updater_operations_handler(
    State(matcher): State<Arc<dyn Matcher>>,
    Path(updater): Path<String>,
) -> Result<Json<Vec<UpdateOperation>>, ErrorReply> {
    let mut histories = matcher
        .update_operations(std::slice::from_ref(&updater))
        .await
        .map_err(error_reply)?;
    match histories.remove(&updater) {
        Some(operations) => Ok(Json(operations)),
        None => Err(error_reply(ServiceError::NotFound(format!(
            "updater {updater}"
        )))),
    }
}

/// Delete one retained update operation.
async fn delete_update_operation_handler(
    State(matcher): State<Arc<dyn Matcher>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ErrorReply> {
    let id = Uuid::parse_str(&id)
        .map_err(|e| error_reply(ServiceError::Validation(format!("malformed id {id:?}: {e}"))))?;
    let deleted = matcher
        .delete_update_operations(&[id])
        .await
        .map_err(error_reply)?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Added/removed vulnerabilities between two operations.
async fn update_diff_handler(
    State(matcher): State<Arc<dyn Matcher>>,
    Query(query): Query<UpdateDiffQuery>,
) -> Result<Json<UpdateDiff>, ErrorReply> {
    let parse = |name: &str, value: Option<&String>| -> Result<Uuid, ErrorReply> {
        let raw = value.ok_or_else(|| {
            error_reply(ServiceError::Validation(format!(
                "missing query parameter {name:?}"
            )))
        })?;
        Uuid::parse_str(raw).map_err(|e| {
            error_reply(ServiceError::Validation(format!(
                "malformed {name} id {raw:?}: {e}"
            )))
        })
    };
    let prev = parse("prev", query.prev.as_ref())?;
    let cur = parse("cur", query.cur.as_ref())?;

    let diff = matcher.update_diff(prev, cur).await.map_err(error_reply)?;
    Ok(Json(diff))
}

// ============================================================================
// Router Construction
// ============================================================================

/// Process health.
async fn health_handler(State(mode): State<Mode>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: mode.name().to_string(),
    })
}

fn indexer_router(indexer: Arc<dyn Indexer>) -> Router {
    Router::new()
        .route(INDEX_REPORT_API_PATH, post(index_handler))
        .route(INDEX_REPORT_DIGEST_API_PATH, get(index_report_handler))
        .route(AFFECTED_MANIFEST_API_PATH, get(affected_manifests_handler))
        .route(INDEX_STATE_API_PATH, get(index_state_handler))
        .with_state(indexer)
}

fn matcher_router(matcher: Arc<dyn Matcher>) -> Router {
    Router::new()
        .route(VULNERABILITY_REPORT_API_PATH, post(vulnerability_report_handler))
        .route(UPDATE_OPERATION_API_PATH, get(update_operations_handler))
        .route(
            UPDATE_OPERATION_REF_API_PATH,
            get(updater_operations_handler).delete(delete_update_operation_handler),
        )
        .route(UPDATE_DIFF_API_PATH, get(update_diff_handler))
        .with_state(matcher)
}

/// Build the fixed routing table for a validated configuration.
///
/// Consumes the state: the table is built exactly once and handlers are
/// bound to their backend here, so no handler ever observes a missing
/// backend and configuration cannot be re-entered.
pub fn create_router(state: ServiceState) -> Router {
    let mode = state.mode();
    let router = match state.backends {
        Backends::Indexer(indexer) => indexer_router(indexer),
        Backends::Matcher(matcher) => matcher_router(matcher),
        Backends::Combined { indexer, matcher } => {
            indexer_router(indexer).merge(matcher_router(matcher))
        }
    };
    router.merge(
        Router::new()
            .route(HEALTH_API_PATH, get(health_handler))
            .with_state(mode),
    )
}
