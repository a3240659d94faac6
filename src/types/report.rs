//! Index and vulnerability reports.
//!
//! Maps use `BTreeMap` so report serialization is deterministic for a given
//! input, which keeps repeated index calls bit-identical.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::manifest::Digest;
use super::package::Package;
use super::vulnerability::Vulnerability;

/// The Index Service's output for a manifest digest.
///
/// Keyed by manifest digest; at most one report per digest per state token.
/// A report whose `state` no longer matches the indexer's current token is
/// stale and must be recomputed before matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    /// Digest of the indexed manifest.
    pub manifest_digest: Digest,
    /// State token of the indexing algorithm that produced this report.
    pub state: String,
    /// Detected packages keyed by package id.
    pub packages: BTreeMap<String, Package>,
    /// Whether indexing completed.
    pub success: bool,
}

impl IndexReport {
    /// Find a package in this report affected by the given advisory.
    pub fn affected_package(&self, vuln: &Vulnerability) -> Option<&Package> {
        self.packages.values().find(|p| vuln.affects(p))
    }
}

/// Result of matching an index report against the active vulnerability set.
///
/// Ephemeral: recomputed on every scan, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    /// Digest of the scanned manifest.
    pub manifest_digest: Digest,
    /// Packages from the index report, keyed by package id.
    pub packages: BTreeMap<String, Package>,
    /// Matched advisories keyed by vulnerability id.
    pub vulnerabilities: BTreeMap<String, Vulnerability>,
    /// Package id to the vulnerability ids affecting it.
    pub package_vulnerabilities: BTreeMap<String, Vec<String>>,
}

/// Reverse index from a vulnerability set to previously indexed manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedManifests {
    /// The queried advisories keyed by vulnerability id.
    pub vulnerabilities: BTreeMap<String, Vulnerability>,
    /// Vulnerability id to the digests of manifests containing an affected
    /// package, in digest order.
    pub vulnerable_manifests: BTreeMap<String, Vec<Digest>>,
}
