//! Core types for the scangate service contract.

pub mod manifest;
pub mod package;
pub mod report;
pub mod update;
pub mod vulnerability;

pub use manifest::{Digest, DigestError, Manifest, ManifestError};
pub use package::Package;
pub use report::{AffectedManifests, IndexReport, VulnerabilityReport};
pub use update::{UpdateDiff, UpdateOperation};
pub use vulnerability::{Severity, VersionRange, Vulnerability};
