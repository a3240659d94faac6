//! Service error taxonomy.
//!
//! Every backend failure is normalized into [`ServiceError`] before it
//! crosses the service boundary; internal backend error types never reach
//! the wire. Configuration failures are a separate, fatal type
//! ([`ConfigError`]) and are never surfaced as per-request errors.

/// Normalized error for every contract operation.
///
/// Each kind carries a stable machine-readable code (see [`code`]) and maps
/// to exactly one HTTP status in the service layer.
///
/// [`code`]: ServiceError::code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Unknown digest, identifier, or updater. The caller can retry with
    /// corrected input.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request shape. A caller error; never retried automatically.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The index report's state token is outdated. The caller should
    /// reindex, then retry.
    #[error("index state is stale: report has {have:?}, indexer is at {want:?}")]
    Stale {
        /// State token carried by the report.
        have: String,
        /// The indexer's current state token.
        want: String,
    },

    /// Backend unavailable or timed out. Safe to retry with backoff.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The requested change conflicts with live state, e.g. deleting an
    /// updater's active operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Uncategorized backend failure.
    #[error("internal: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Stale { .. } => "stale_index_state",
            Self::Transient(_) => "transient",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}

/// Fatal configuration error raised before the server starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The selected mode needs an Index Service backend.
    #[error("mode {0} requires an indexer backend")]
    MissingIndexer(&'static str),
    /// The selected mode needs a Match Service backend.
    #[error("mode {0} requires a matcher backend")]
    MissingMatcher(&'static str),
}
