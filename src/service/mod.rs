//! scangate HTTP facade
//!
//! Exposes the Index and Match Service contracts over one mode-aware REST
//! surface.
//!
//! ## Endpoints
//!
//! Indexer modes:
//!
//! - `POST /index_report` - Index a manifest (201 on success)
//! - `GET /index_report/:digest` - Look up a report by manifest digest
//! - `GET /internal/affected_manifest` - Reverse lookup to affected manifests
//! - `GET /index_state` - Current indexing-algorithm state token
//!
//! Matcher modes:
//!
//! - `POST /vulnerability_report` - Match a report against active advisories
//! - `GET /update_operation` - Operation histories (`?latest=true` for pointers)
//! - `GET /update_operation/:ref` - One updater's history
//! - `DELETE /update_operation/:ref` - Delete one retained operation
//! - `GET /update_diff?prev=&cur=` - Diff two operations
//!
//! All modes:
//!
//! - `GET /health` - Process health

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::metrics_middleware;
pub use routes::{
    create_router, DeleteResponse, ErrorResponse, HealthResponse, IndexStateResponse,
    AFFECTED_MANIFEST_API_PATH, HEALTH_API_PATH, INDEX_REPORT_API_PATH,
    INDEX_REPORT_DIGEST_API_PATH, INDEX_STATE_API_PATH, LATEST_UPDATE_OPERATION_HEADER,
    UPDATE_DIFF_API_PATH, UPDATE_OPERATION_API_PATH, UPDATE_OPERATION_REF_API_PATH,
    VULNERABILITY_REPORT_API_PATH,
};
pub use state::{Mode, ServiceState};
