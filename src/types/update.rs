//! Update-operation provenance types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::vulnerability::Vulnerability;

/// One ingestion event by a named updater.
///
/// Identifiers are v4 UUIDs: globally unique and unordered. Ordering within
/// an updater's history comes from `date`. Once issued, an identifier is
/// permanent and never reused, even after the operation is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOperation {
    /// Operation identifier.
    pub id: Uuid,
    /// Name of the updater that produced this operation.
    pub updater: String,
    /// Canonical content fingerprint of the ingested vulnerability set.
    pub fingerprint: String,
    /// Creation timestamp; strictly orders operations per updater.
    pub date: DateTime<Utc>,
}

/// Set difference of active vulnerabilities between two update operations.
///
/// Symmetric: `diff(a, b).added == diff(b, a).removed` and vice versa, keyed
/// by vulnerability id. `diff(x, x)` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDiff {
    /// The older operation of the comparison.
    pub prev: UpdateOperation,
    /// The newer operation of the comparison.
    pub cur: UpdateOperation,
    /// Vulnerabilities present in `cur` but not `prev`, in id order.
    pub added: Vec<Vulnerability>,
    /// Vulnerabilities present in `prev` but not `cur`, in id order.
    pub removed: Vec<Vulnerability>,
}
