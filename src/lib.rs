//! # scangate
//!
//! HTTP facade composing two backend services that together detect software
//! vulnerabilities in container images: an **Index Service** that extracts
//! package inventories from manifests, and a **Match Service** that matches
//! those inventories against continuously-updated vulnerability data.
//!
//! The facade answers one question:
//!
//! > Given two independently-deployable backends, how are their operations
//! > exposed as one coherent, mode-aware API without sacrificing their
//! > consistency guarantees?
//!
//! ## Core Contract
//!
//! 1. Indexing is memoized and idempotent: one computation per digest per
//!    state token, shared by all concurrent callers
//! 2. Vulnerability data is versioned per updater; the active set swaps
//!    atomically and scans read one consistent snapshot
//! 3. Routes are fixed at configuration time from the selected mode; a mode
//!    missing its backend fails before the server starts
//!
//! ## Architecture
//!
//! ```text
//! HTTP request → Router (fixed per Mode) → handler
//!                    ↓                        ↓
//!          Indexer contract          Matcher contract
//!        (CachingIndexer over        (UpdateLog history +
//!         any backend)                snapshot matching)
//! ```
//!
//! ## Consistency Guarantees
//!
//! - Same manifest + same state token → bit-identical index reports
//! - A scan never observes an updater's vulnerability set half-swapped
//! - Operation identifiers are permanent, never reused after deletion

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod error;
pub mod indexer;
pub mod matcher;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use error::{ConfigError, ServiceError};
pub use indexer::{CachingIndexer, InMemoryIndexer, Indexer, SingleFlight};
pub use matcher::{InMemoryMatcher, Matcher, UpdateLog};
pub use types::{
    AffectedManifests, Digest, DigestError, IndexReport, Manifest, ManifestError, Package,
    Severity, UpdateDiff, UpdateOperation, VersionRange, Vulnerability, VulnerabilityReport,
};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};

// Service re-exports (when the service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, Mode, ServiceState};

/// Version of the built-in indexing algorithm.
/// Increment when extraction semantics change; cached reports computed under
/// the previous version become stale.
pub const INDEXER_ALGORITHM_VERSION: &str = "1.0.0";
