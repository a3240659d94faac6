//! scangate Service Binary
//!
//! Runs the scangate facade as a REST API service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown handling
//! - Mode-aware route configuration
//!
//! ## Configuration
//!
//! Environment variables:
//! - `SCANGATE_MODE`: "indexer", "matcher", or "combined" (default: combined)
//! - `SCANGATE_VULN_DB`: path to a JSON seed file, a map of updater name to
//!   vulnerability list; one update operation is recorded per updater
//! - `PORT`: Service port (default: 8002)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! SCANGATE_MODE=combined SCANGATE_VULN_DB=vulns.json cargo run --bin scangate_service
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use scangate::service::{create_router, metrics_middleware, Mode, ServiceState};
use scangate::{CachingIndexer, InMemoryIndexer, InMemoryMatcher, Indexer, Vulnerability};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scangate_service=info,scangate=info,tower_http=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Request logging middleware that adds correlation ID and timing
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let trace_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    info!(
        target: "scangate_service::access",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );

    response
}

/// Seed the matcher from a JSON vulnerability file.
///
/// The file is a map of updater name to vulnerability list; each entry is
/// recorded as that updater's initial update operation.
fn seed_matcher(matcher: &InMemoryMatcher, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let sets: BTreeMap<String, Vec<Vulnerability>> = serde_json::from_str(&raw)?;
    for (updater, vulnerabilities) in sets {
        let operation = matcher.log().record(&updater, vulnerabilities);
        info!(
            updater = %operation.updater,
            operation = %operation.id,
            fingerprint = %operation.fingerprint,
            "seeded update operation"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    info!(version = version, "Starting scangate service");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8002);
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let mode_name = std::env::var("SCANGATE_MODE").unwrap_or_else(|_| "combined".to_string());
    let mode = match Mode::from_str(&mode_name) {
        Some(mode) => mode,
        None => {
            tracing::error!(mode = %mode_name, "Unknown mode, expected indexer|matcher|combined");
            return Err(format!("unknown mode {mode_name:?}").into());
        }
    };

    // Persistent storage engines are out of scope; the reference deployment
    // runs on the in-memory backends.
    let indexer = if mode.serves_indexer() {
        Some(Arc::new(CachingIndexer::new(InMemoryIndexer::new())))
    } else {
        None
    };
    let matcher = if mode.serves_matcher() {
        let matcher = Arc::new(InMemoryMatcher::new());
        match std::env::var("SCANGATE_VULN_DB") {
            Ok(path) => seed_matcher(&matcher, &path)?,
            Err(_) => warn!("SCANGATE_VULN_DB not set, matcher starts with no vulnerability data"),
        }
        if let Some(indexer) = &indexer {
            matcher.set_index_state(indexer.state().await?);
        }
        Some(matcher)
    } else {
        None
    };

    let state = ServiceState::new(
        mode,
        indexer.map(|i| i as Arc<dyn Indexer>),
        matcher.map(|m| m as Arc<dyn scangate::Matcher>),
    )?;
    info!(mode = %mode, routes = mode.endpoints().len(), "Routing table configured");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(address = %addr, version = version, "scangate service listening");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
            _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        }
    };

    info!("Ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("scangate service shutdown complete");

    Ok(())
}
