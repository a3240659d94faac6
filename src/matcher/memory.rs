//! In-memory matcher backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::types::{IndexReport, UpdateDiff, UpdateOperation, VulnerabilityReport};

use super::update_log::UpdateLog;
use super::Matcher;

/// In-memory matcher backend over an [`UpdateLog`].
///
/// Matching reads one active snapshot per scan, so a concurrent operation
/// swap is observed either fully old or fully new. When the matcher knows
/// the indexer's current state token, scans of reports carrying any other
/// token fail with [`ServiceError::Stale`]; a standalone matcher that has
/// not been told a token scans unchecked.
#[derive(Default)]
pub struct InMemoryMatcher {
    log: UpdateLog,
    index_state: RwLock<Option<String>>,
}

impl InMemoryMatcher {
    /// Create a matcher with an empty update log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a matcher that validates reports against `state`.
    pub fn with_index_state(state: impl Into<String>) -> Self {
        Self {
            log: UpdateLog::new(),
            index_state: RwLock::new(Some(state.into())),
        }
    }

    /// Tell the matcher the indexer's current state token.
    pub fn set_index_state(&self, state: impl Into<String>) {
        *self.index_state.write() = Some(state.into());
    }

    /// The update log backing this matcher; ingestion records through here.
    pub fn log(&self) -> &UpdateLog {
        &self.log
    }
}

#[async_trait]
impl Matcher for InMemoryMatcher {
    async fn scan(&self, report: &IndexReport) -> Result<VulnerabilityReport, ServiceError> {
        if let Some(want) = self.index_state.read().clone() {
            if report.state != want {
                return Err(ServiceError::Stale {
                    have: report.state.clone(),
                    want,
                });
            }
        }

        // One snapshot for the whole scan.
        let snapshot = self.log.active_snapshot();

        let mut vulnerabilities = BTreeMap::new();
        let mut package_vulnerabilities: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for package in report.packages.values() {
            for set in snapshot.values() {
                for vuln in set.vulnerabilities.iter() {
                    if vuln.affects(package) {
                        vulnerabilities.insert(vuln.id.clone(), vuln.clone());
                        package_vulnerabilities
                            .entry(package.id.clone())
                            .or_default()
                            .push(vuln.id.clone());
                    }
                }
            }
        }
        for ids in package_vulnerabilities.values_mut() {
            ids.sort();
            ids.dedup();
        }

        Ok(VulnerabilityReport {
            manifest_digest: report.manifest_digest.clone(),
            packages: report.packages.clone(),
            vulnerabilities,
            package_vulnerabilities,
        })
    }

    async fn update_operations(
        &self,
        updaters: &[String],
    ) -> Result<BTreeMap<String, Vec<UpdateOperation>>, ServiceError> {
        Ok(self.log.update_operations(updaters))
    }

    async fn latest_update_operation(&self) -> Result<Option<Uuid>, ServiceError> {
        Ok(self.log.latest_update_operation())
    }

    async fn latest_update_operations(&self) -> Result<BTreeMap<String, Uuid>, ServiceError> {
        Ok(self.log.latest_update_operations())
    }

    async fn update_diff(&self, prev: Uuid, cur: Uuid) -> Result<UpdateDiff, ServiceError> {
        self.log.update_diff(prev, cur)
    }

    async fn delete_update_operations(&self, ids: &[Uuid]) -> Result<u64, ServiceError> {
        self.log.delete_update_operations(ids)
    }
}
