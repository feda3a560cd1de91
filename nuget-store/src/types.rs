//! Core data types for stored packages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The `(id, version)` pair naming a package.
///
/// `id` keeps the casing declared by the package; lookups compare it
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: String,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Metadata for one stored package version.
///
/// Always derived from the archive itself; the metadata cache only memoizes
/// what the archive on disk says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub id: String,
    pub version: String,
    pub description: Option<String>,
    pub authors: Option<String>,
    pub tags: Option<String>,
    pub published: DateTime<Utc>,
    pub download_count: u64,
}

impl PackageMetadata {
    /// Case-insensitive substring match on id, description or tags.
    ///
    /// `lowercase_query` must already be lowercased.
    pub fn matches(&self, lowercase_query: &str) -> bool {
        let contains = |field: &str| field.to_lowercase().contains(lowercase_query);

        contains(&self.id)
            || self.description.as_deref().is_some_and(contains)
            || self.tags.as_deref().is_some_and(contains)
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Removed,
    /// No archive at that identity, or deletion is disabled
    NotFound,
}

/// Totals describing the contents of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySummary {
    /// Distinct package ids with at least one archive
    pub package_count: usize,
    /// Stored archives across all ids
    pub version_count: usize,
    /// Sum of archive sizes in bytes
    pub total_bytes: u64,
}
