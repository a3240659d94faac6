//! Advisory records and version-range matching.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::package::Package;

/// Advisory severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Severity {
    /// Severity not provided by the source updater.
    #[default]
    Unknown,
    /// Technically a flaw, but with no practical impact.
    Negligible,
    /// Low impact.
    Low,
    /// Medium impact.
    Medium,
    /// High impact.
    High,
    /// Critical impact.
    Critical,
}

impl Severity {
    /// Parse severity from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Some(Self::Unknown),
            "negligible" => Some(Self::Negligible),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Negligible => write!(f, "negligible"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A half-open affected version range.
///
/// `introduced == None` means every version up to `fixed` is affected;
/// `fixed == None` means the flaw is unfixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    /// First affected version.
    pub introduced: Option<String>,
    /// First fixed version.
    pub fixed: Option<String>,
}

/// An advisory record ingested from a named updater.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Advisory identifier, e.g. `CVE-2024-1234`.
    pub id: String,
    /// Human-readable advisory name.
    pub name: String,
    /// Advisory description.
    #[serde(default)]
    pub description: String,
    /// Severity assigned by the source.
    #[serde(default)]
    pub severity: Severity,
    /// Name of the updater this advisory came from.
    pub updater: String,
    /// Name of the affected package.
    pub package_name: String,
    /// Affected version ranges. Empty means no version matches.
    #[serde(default)]
    pub ranges: Vec<VersionRange>,
    /// First version carrying the fix, if any.
    #[serde(default)]
    pub fixed_in: Option<String>,
}

impl Vulnerability {
    /// Whether this advisory affects the given package instance.
    ///
    /// Matches by package name, then by version range. Ranges compare as
    /// SemVer when both sides parse, falling back to lexicographic
    /// comparison for non-SemVer version strings.
    pub fn affects(&self, package: &Package) -> bool {
        if self.package_name != package.name {
            return false;
        }
        is_affected(&package.version, &self.ranges)
    }
}

/// Whether a version falls inside any of the given ranges.
///
/// `introduced <= version < fixed`, with each absent bound unbounded.
fn is_affected(version: &str, ranges: &[VersionRange]) -> bool {
    ranges.iter().any(|range| is_in_range(version, range))
}

fn is_in_range(version: &str, range: &VersionRange) -> bool {
    if let Ok(parsed) = semver::Version::parse(version) {
        return is_in_range_semver(&parsed, range);
    }
    is_in_range_string(version, range)
}

fn is_in_range_semver(version: &semver::Version, range: &VersionRange) -> bool {
    if let Some(introduced) = range.introduced.as_deref() {
        if let Ok(intro) = semver::Version::parse(introduced) {
            if *version < intro {
                return false;
            }
        }
    }
    if let Some(fixed) = range.fixed.as_deref() {
        if let Ok(fix) = semver::Version::parse(fixed) {
            if *version >= fix {
                return false;
            }
        }
    }
    true
}

// Fallback when the package version is not SemVer.
fn is_in_range_string(version: &str, range: &VersionRange) -> bool {
    if let Some(introduced) = range.introduced.as_deref() {
        if version < introduced {
            return false;
        }
    }
    if let Some(fixed) = range.fixed.as_deref() {
        if version >= fixed {
            return false;
        }
    }
    true
}
