//! Detected package instances.

use serde::{Deserialize, Serialize};

/// A package instance detected inside a manifest's layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Stable identifier within an index report.
    pub id: String,
    /// Package name as reported by the extraction backend.
    pub name: String,
    /// Package version string. Not guaranteed to be SemVer.
    pub version: String,
}

impl Package {
    /// Construct a package with an id derived from name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        Self {
            id: format!("{}@{}", name, version),
            name,
            version,
        }
    }
}
