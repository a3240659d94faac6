//! Match Service contract and reference backend.
//!
//! The [`Matcher`] trait is the complete Match Service surface. The
//! versioning machinery lives in [`UpdateLog`]: per-updater operation
//! history, an atomically swapped latest-per-updater snapshot, diffs, and
//! conflict-checked deletion. [`InMemoryMatcher`] composes an `UpdateLog`
//! with snapshot-consistent matching of index reports.

pub mod memory;
pub mod update_log;

use async_trait::async_trait;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::types::{IndexReport, UpdateDiff, UpdateOperation, VulnerabilityReport};

/// Contract for the Match Service backend.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Match a report's packages against the active vulnerability set.
    ///
    /// Reads a consistent snapshot of active vulnerabilities: the result
    /// never mixes an updater's old and new sets mid-swap. A report whose
    /// state token is outdated fails with [`ServiceError::Stale`].
    async fn scan(&self, report: &IndexReport) -> Result<VulnerabilityReport, ServiceError>;

    /// Update-operation histories, most-recent-first per updater.
    ///
    /// An empty filter returns all updaters. Updaters named in the filter
    /// but unknown to the log are absent from the result.
    async fn update_operations(
        &self,
        updaters: &[String],
    ) -> Result<BTreeMap<String, Vec<UpdateOperation>>, ServiceError>;

    /// Identifier of the globally most recent operation across updaters.
    ///
    /// A cheap freshness heartbeat; `None` when nothing has been ingested.
    async fn latest_update_operation(&self) -> Result<Option<Uuid>, ServiceError>;

    /// Per-updater latest pointers.
    ///
    /// Every returned identifier is present in the corresponding
    /// `update_operations` history.
    async fn latest_update_operations(&self) -> Result<BTreeMap<String, Uuid>, ServiceError>;

    /// Added/removed vulnerabilities between two named operations.
    ///
    /// Fails with [`ServiceError::NotFound`] if either identifier is
    /// unresolvable. `update_diff(x, x)` yields an empty diff.
    async fn update_diff(&self, prev: Uuid, cur: Uuid) -> Result<UpdateDiff, ServiceError>;

    /// Delete retained, non-active operations; returns how many existed.
    ///
    /// Absent identifiers are skipped without error and do not count.
    /// Naming an active operation fails the whole batch with
    /// [`ServiceError::Conflict`] and deletes nothing.
    async fn delete_update_operations(&self, ids: &[Uuid]) -> Result<u64, ServiceError>;
}

pub use memory::InMemoryMatcher;
pub use update_log::{ActiveSet, ActiveSnapshot, UpdateLog};
