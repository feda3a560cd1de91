//! Free-text search over scanned package metadata.
//!
//! The repository scans the store and hands every readable archive to
//! [`build_results`], which filters, groups by id and paginates. Groups keep
//! the order in which their first member was seen, so for a fixed directory
//! state consecutive `skip`/`take` windows never overlap or reorder.

use crate::types::PackageMetadata;
use crate::version::PackageVersion;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default page size
pub const DEFAULT_TAKE: usize = 20;

/// Search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text filter; empty or whitespace matches everything
    pub query: Option<String>,
    pub skip: usize,
    pub take: usize,
    pub include_prerelease: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: None,
            skip: 0,
            take: DEFAULT_TAKE,
            include_prerelease: true,
        }
    }
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = take;
        self
    }

    pub fn include_prerelease(mut self, include: bool) -> Self {
        self.include_prerelease = include;
        self
    }

    /// The lowercased query, or `None` when it matches everything.
    fn normalized(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}

/// One page of grouped search hits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Number of groups after filtering, before pagination
    pub total_hits: usize,
    pub data: Vec<SearchResultItem>,
}

/// All matching versions of one package id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub id: String,
    /// Highest matching version
    pub version: String,
    pub description: Option<String>,
    pub authors: Option<String>,
    pub tags: Option<String>,
    pub total_downloads: u64,
    /// Matching versions, highest first
    pub versions: Vec<SearchResultVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultVersion {
    pub version: String,
    pub downloads: u64,
}

/// Filter, group and paginate scanned entries.
///
/// Groups are keyed by case-insensitive id. The representative description,
/// authors and tags come from the first entry seen in each group.
pub fn build_results(
    entries: Vec<(PackageVersion, PackageMetadata)>,
    query: &SearchQuery,
) -> SearchResult {
    let needle = query.normalized();

    let mut groups: IndexMap<String, Vec<(PackageVersion, PackageMetadata)>> = IndexMap::new();
    for (version, metadata) in entries {
        if !query.include_prerelease && version.is_prerelease() {
            continue;
        }
        if let Some(needle) = needle.as_deref() {
            if !metadata.matches(needle) {
                continue;
            }
        }
        groups
            .entry(metadata.id.to_lowercase())
            .or_default()
            .push((version, metadata));
    }

    let total_hits = groups.len();
    let data = groups
        .into_values()
        .skip(query.skip)
        .take(query.take)
        .filter_map(summarize_group)
        .collect();

    SearchResult { total_hits, data }
}

fn summarize_group(mut group: Vec<(PackageVersion, PackageMetadata)>) -> Option<SearchResultItem> {
    let representative = group.first()?.1.clone();
    let total_downloads = group.iter().map(|(_, m)| m.download_count).sum();

    // Stable sort keeps first-seen order among equal-precedence versions
    group.sort_by(|(a, _), (b, _)| b.cmp(a));
    let versions: Vec<SearchResultVersion> = group
        .iter()
        .map(|(_, m)| SearchResultVersion {
            version: m.version.clone(),
            downloads: m.download_count,
        })
        .collect();

    Some(SearchResultItem {
        id: representative.id,
        version: versions.first()?.version.clone(),
        description: representative.description,
        authors: representative.authors,
        tags: representative.tags,
        total_downloads,
        versions,
    })
}
