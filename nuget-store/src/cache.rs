//! In-memory metadata cache.
//!
//! Memoizes what archives on disk say, keyed by lowercased id and exact
//! version. Entries are never evicted; the cache grows with the number of
//! distinct versions touched, which is bounded by the store itself.

use crate::types::PackageMetadata;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    id: String,
    version: String,
}

impl CacheKey {
    fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_lowercase(),
            version: version.to_string(),
        }
    }
}

/// Concurrent identity-to-metadata map.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<CacheKey, PackageMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str, version: &str) -> Option<PackageMetadata> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let hit = entries.get(&CacheKey::new(id, version)).cloned();
        debug!(id, version, hit = hit.is_some(), "Metadata cache lookup");
        hit
    }

    /// Insert or replace the entry for the metadata's identity.
    pub fn put(&self, metadata: PackageMetadata) {
        let key = CacheKey::new(&metadata.id, &metadata.version);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, metadata);
    }

    pub fn remove(&self, id: &str, version: &str) -> Option<PackageMetadata> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&CacheKey::new(id, version))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn metadata(id: &str, version: &str) -> PackageMetadata {
        PackageMetadata {
            id: id.to_string(),
            version: version.to_string(),
            description: None,
            authors: None,
            tags: None,
            published: Utc::now(),
            download_count: 0,
        }
    }

    #[test]
    fn test_id_case_insensitive_version_exact() {
        let cache = MetadataCache::new();
        cache.put(metadata("Foo", "1.0.0-Beta"));

        assert!(cache.get("foo", "1.0.0-Beta").is_some());
        assert!(cache.get("FOO", "1.0.0-Beta").is_some());
        assert!(cache.get("Foo", "1.0.0-beta").is_none());
        assert_eq!(cache.get("foo", "1.0.0-Beta").unwrap().id, "Foo");
    }

    #[test]
    fn test_put_replaces_and_remove_clears() {
        let cache = MetadataCache::new();
        cache.put(metadata("Foo", "1.0.0"));
        let mut updated = metadata("foo", "1.0.0");
        updated.description = Some("new".to_string());
        cache.put(updated);

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("Foo", "1.0.0").unwrap().description.as_deref(),
            Some("new")
        );

        assert!(cache.remove("FOO", "1.0.0").is_some());
        assert!(cache.remove("FOO", "1.0.0").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(MetadataCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        let version = format!("{}.{}.0", i, n);
                        cache.put(metadata("Pkg", &version));
                        assert!(cache.get("pkg", &version).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 400);
    }
}
