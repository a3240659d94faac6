//! Versioned update-operation history.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::canonical::canonical_hash_hex;
use crate::error::ServiceError;
use crate::types::{UpdateDiff, UpdateOperation, Vulnerability};

/// An updater's active operation and its vulnerability set.
#[derive(Debug, Clone)]
pub struct ActiveSet {
    /// The updater's most recent operation.
    pub operation: UpdateOperation,
    /// Vulnerabilities ingested by that operation.
    pub vulnerabilities: Arc<Vec<Vulnerability>>,
}

/// Immutable latest-per-updater snapshot.
///
/// Scans clone the `Arc` once and match against that map; a concurrent
/// [`UpdateLog::record`] replaces the whole map rather than mutating it, so
/// a snapshot never shows an updater half-swapped.
pub type ActiveSnapshot = Arc<BTreeMap<String, ActiveSet>>;

struct StoredOperation {
    operation: UpdateOperation,
    vulnerabilities: Arc<Vec<Vulnerability>>,
}

struct LogInner {
    /// All retained operations by id.
    operations: BTreeMap<Uuid, StoredOperation>,
    /// Per-updater history, most-recent-first.
    history: BTreeMap<String, Vec<Uuid>>,
    /// Latest-per-updater snapshot, replaced wholesale on record.
    active: ActiveSnapshot,
}

/// History of update operations with an atomically swapped active set.
///
/// Operation identifiers are permanent: deletion removes the operation but
/// the v4 identifier is never reissued.
pub struct UpdateLog {
    inner: RwLock<LogInner>,
}

impl Default for UpdateLog {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LogInner {
                operations: BTreeMap::new(),
                history: BTreeMap::new(),
                active: Arc::new(BTreeMap::new()),
            }),
        }
    }

    /// Record one ingestion event for `updater`.
    ///
    /// Assigns a fresh identifier, fingerprints the vulnerability set, and
    /// swaps the updater's active pointer in a single critical section.
    pub fn record(&self, updater: &str, vulnerabilities: Vec<Vulnerability>) -> UpdateOperation {
        let operation = UpdateOperation {
            id: Uuid::new_v4(),
            updater: updater.to_string(),
            fingerprint: canonical_hash_hex(&vulnerabilities),
            date: Utc::now(),
        };
        let vulnerabilities = Arc::new(vulnerabilities);

        let mut inner = self.inner.write();
        inner.operations.insert(
            operation.id,
            StoredOperation {
                operation: operation.clone(),
                vulnerabilities: Arc::clone(&vulnerabilities),
            },
        );
        inner
            .history
            .entry(updater.to_string())
            .or_default()
            .insert(0, operation.id);

        let mut active = (*inner.active).clone();
        active.insert(
            updater.to_string(),
            ActiveSet {
                operation: operation.clone(),
                vulnerabilities,
            },
        );
        inner.active = Arc::new(active);

        tracing::debug!(
            updater,
            operation = %operation.id,
            fingerprint = %operation.fingerprint,
            "recorded update operation"
        );
        operation
    }

    /// The current latest-per-updater snapshot.
    pub fn active_snapshot(&self) -> ActiveSnapshot {
        Arc::clone(&self.inner.read().active)
    }

    /// Operation histories, most-recent-first per updater.
    ///
    /// An empty filter selects all updaters; unknown names are omitted.
    pub fn update_operations(
        &self,
        updaters: &[String],
    ) -> BTreeMap<String, Vec<UpdateOperation>> {
        let inner = self.inner.read();
        let names: Vec<&String> = if updaters.is_empty() {
            inner.history.keys().collect()
        } else {
            updaters.iter().collect()
        };

        let mut out = BTreeMap::new();
        for name in names {
            if let Some(ids) = inner.history.get(name) {
                let ops = ids
                    .iter()
                    .filter_map(|id| inner.operations.get(id))
                    .map(|stored| stored.operation.clone())
                    .collect();
                out.insert(name.clone(), ops);
            }
        }
        out
    }

    /// Per-updater latest pointers.
    pub fn latest_update_operations(&self) -> BTreeMap<String, Uuid> {
        self.inner
            .read()
            .active
            .iter()
            .map(|(updater, set)| (updater.clone(), set.operation.id))
            .collect()
    }

    /// Globally most recent operation, derived from the active map by date.
    pub fn latest_update_operation(&self) -> Option<Uuid> {
        self.inner
            .read()
            .active
            .values()
            .max_by_key(|set| set.operation.date)
            .map(|set| set.operation.id)
    }

    /// Set difference of vulnerabilities between two operations.
    pub fn update_diff(&self, prev: Uuid, cur: Uuid) -> Result<UpdateDiff, ServiceError> {
        let inner = self.inner.read();
        let prev_op = inner
            .operations
            .get(&prev)
            .ok_or_else(|| ServiceError::NotFound(format!("update operation {prev}")))?;
        let cur_op = inner
            .operations
            .get(&cur)
            .ok_or_else(|| ServiceError::NotFound(format!("update operation {cur}")))?;

        Ok(UpdateDiff {
            prev: prev_op.operation.clone(),
            cur: cur_op.operation.clone(),
            added: difference(&cur_op.vulnerabilities, &prev_op.vulnerabilities),
            removed: difference(&prev_op.vulnerabilities, &cur_op.vulnerabilities),
        })
    }

    /// Delete retained operations; absent ids are skipped, active ids
    /// conflict.
    pub fn delete_update_operations(&self, ids: &[Uuid]) -> Result<u64, ServiceError> {
        let mut inner = self.inner.write();

        if let Some(active) = ids
            .iter()
            .find(|id| inner.active.values().any(|set| set.operation.id == **id))
        {
            return Err(ServiceError::Conflict(format!(
                "update operation {active} is the active operation for its updater"
            )));
        }

        let mut deleted = 0u64;
        for id in ids {
            if let Some(stored) = inner.operations.remove(id) {
                if let Some(history) = inner.history.get_mut(&stored.operation.updater) {
                    history.retain(|h| h != id);
                }
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Vulnerabilities in `left` whose id is absent from `right`, in id order.
fn difference(left: &[Vulnerability], right: &[Vulnerability]) -> Vec<Vulnerability> {
    let right_ids: std::collections::BTreeSet<&str> =
        right.iter().map(|v| v.id.as_str()).collect();
    let by_id: BTreeMap<&str, &Vulnerability> = left
        .iter()
        .filter(|v| !right_ids.contains(v.id.as_str()))
        .map(|v| (v.id.as_str(), v))
        .collect();
    by_id.into_values().cloned().collect()
}
