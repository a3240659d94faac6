//! Service middleware for request metrics.
//!
//! ## Metrics Exposed
//!
//! - request counts by path pattern, method, and status
//! - request latency
//!
//! Emitted as structured log events; an aggregator can derive counters and
//! histograms from them.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "scangate::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize a path for metrics to avoid high cardinality.
///
/// Operation ids and manifest digests appear as path segments; both are
/// collapsed to placeholders.
fn normalize_path(path: &str) -> String {
    let uuid = regex_lite::Regex::new(
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
    )
    .unwrap();
    let digest = regex_lite::Regex::new(r"sha256:[0-9a-f]{64}").unwrap();

    let path = uuid.replace_all(path, ":ref");
    digest.replace_all(&path, ":digest").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_operation_id() {
        let path = "/update_operation/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/update_operation/:ref");
    }

    #[test]
    fn test_normalize_path_replaces_digest() {
        let path = format!("/index_report/sha256:{}", "a".repeat(64));
        assert_eq!(normalize_path(&path), "/index_report/:digest");
    }

    #[test]
    fn test_normalize_path_preserves_fixed_paths() {
        assert_eq!(normalize_path("/update_operation"), "/update_operation");
    }
}
