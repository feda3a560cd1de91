//! # Package Repository Engine
//!
//! Owns the storage root and the metadata cache, and composes the storage
//! layout, descriptor parser and identity locks into the registry operations:
//!
//! - **Ingestion**: parse, check the overwrite policy, write atomically, cache
//! - **Retrieval**: metadata by identity, all versions of an id, the raw
//!   archive, grouped free-text search
//! - **Removal**: delete one identity, leaving sibling versions alone
//!
//! There is no persistent index. Listing and search enumerate the directory
//! tree and consult the cache before re-reading an archive. An archive that
//! cannot be read during a scan is logged and left out of the results.
//!
//! ```rust,no_run
//! use nuget_store::{PackageRepository, RepositoryConfig, SearchQuery};
//!
//! # async fn example(nupkg: Vec<u8>) -> nuget_store::RepositoryResult<()> {
//! let repo = PackageRepository::open(RepositoryConfig::new("/srv/packages")).await?;
//! repo.ingest(&nupkg, false).await?;
//!
//! let page = repo.search(&SearchQuery::new("json").take(10)).await?;
//! println!("{} matching packages", page.total_hits);
//! # Ok(())
//! # }
//! ```

use crate::cache::MetadataCache;
use crate::config::RepositoryConfig;
use crate::descriptor::{DescriptorParser, NuspecParser};
use crate::error::{RepositoryError, RepositoryResult};
use crate::layout::StorageLayout;
use crate::locks::IdentityLocks;
use crate::search::{self, SearchQuery, SearchResult};
use crate::storage;
use crate::types::{DeleteOutcome, PackageMetadata, RepositorySummary};
use crate::validation::{is_valid_identity, validate_package_id, validate_version};
use crate::version::PackageVersion;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

pub struct PackageRepository {
    config: RepositoryConfig,
    layout: StorageLayout,
    cache: MetadataCache,
    locks: IdentityLocks,
    parser: Arc<dyn DescriptorParser>,
}

impl std::fmt::Debug for PackageRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageRepository")
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl PackageRepository {
    /// Open a repository that reads `.nuspec` descriptors.
    ///
    /// Creates the storage root if it does not exist yet.
    pub async fn open(config: RepositoryConfig) -> RepositoryResult<Self> {
        Self::open_with_parser(config, Arc::new(NuspecParser::new())).await
    }

    /// Open a repository with a custom descriptor parser.
    pub async fn open_with_parser(
        config: RepositoryConfig,
        parser: Arc<dyn DescriptorParser>,
    ) -> RepositoryResult<Self> {
        fs::create_dir_all(&config.packages_path).await?;
        info!(root = %config.packages_path.display(), "Opened package repository");

        Ok(Self {
            layout: StorageLayout::new(&config.packages_path),
            config,
            cache: MetadataCache::new(),
            locks: IdentityLocks::new(),
            parser,
        })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Whether [`delete`](Self::delete) can remove anything.
    pub fn deletion_enabled(&self) -> bool {
        self.config.enable_delisting
    }

    /// Number of identities currently memoized.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    // ---- Ingestion ----

    /// Store an archive.
    ///
    /// Nothing is written or cached unless every check passes. With
    /// `allow_overwrite` false an existing archive at the same identity is
    /// left untouched and the call fails with `AlreadyExists`.
    pub async fn ingest(
        &self,
        bytes: &[u8],
        allow_overwrite: bool,
    ) -> RepositoryResult<PackageMetadata> {
        let max_bytes = self.config.max_package_size_bytes();
        if bytes.len() as u64 > max_bytes {
            warn!(size = bytes.len(), max_bytes, "Rejected oversized package");
            return Err(RepositoryError::TooLarge { max_bytes });
        }

        let descriptor = self.parser.parse(bytes).map_err(|e| {
            warn!(error = %e, "Rejected unparseable package");
            RepositoryError::from(e)
        })?;

        let (id, version) = (descriptor.id.as_str(), descriptor.version.as_str());
        if let Err(e) = validate_package_id(id).and_then(|_| validate_version(version)) {
            warn!(id, version, error = %e, "Rejected package with invalid identity");
            return Err(RepositoryError::InvalidIdentity(e.to_string()));
        }

        let path = self.layout.path_for(id, version);
        let _guard = self.locks.lock(id, version).await;

        let existing = self.layout.locate(id, version).await?;
        if existing.is_some() && !allow_overwrite {
            warn!(id, version, "Rejected duplicate package");
            return Err(RepositoryError::AlreadyExists {
                id: id.to_string(),
                version: version.to_string(),
            });
        }

        storage::write_atomic(&path, bytes).await?;

        if let Some(previous) = existing {
            self.forget(&previous);
            // Same identity stored under another casing
            if previous != path {
                fs::remove_file(&previous).await?;
                debug!(id, version, previous = %previous.display(), "Removed replaced archive");
            }
        }

        let metadata = PackageMetadata {
            id: descriptor.id.clone(),
            version: descriptor.version.clone(),
            description: descriptor.description,
            authors: descriptor.authors,
            tags: descriptor.tags,
            published: published_at(&path).await,
            download_count: 0,
        };
        self.cache.put(metadata.clone());

        info!(
            id = %metadata.id,
            version = %metadata.version,
            path = %path.display(),
            size = bytes.len(),
            "Package ingested"
        );
        Ok(metadata)
    }

    /// [`ingest`](Self::ingest) with the configured overwrite policy.
    pub async fn ingest_with_policy(&self, bytes: &[u8]) -> RepositoryResult<PackageMetadata> {
        self.ingest(bytes, self.config.allow_overwrite).await
    }

    /// Buffer an upload stream, then [`ingest`](Self::ingest) it.
    ///
    /// The stream is read under the configured size limit and I/O deadline.
    /// A stream that fails partway never reaches the disk.
    pub async fn ingest_reader<R>(
        &self,
        reader: R,
        allow_overwrite: bool,
    ) -> RepositoryResult<PackageMetadata>
    where
        R: AsyncRead + Unpin,
    {
        let max_bytes = self.config.max_package_size_bytes();
        let mut buffer = Vec::new();
        let mut limited = reader.take(max_bytes.saturating_add(1));

        self.with_deadline("buffering upload", limited.read_to_end(&mut buffer))
            .await?;

        if buffer.len() as u64 > max_bytes {
            warn!(max_bytes, "Rejected oversized upload stream");
            return Err(RepositoryError::TooLarge { max_bytes });
        }

        debug!(size = buffer.len(), "Buffered upload stream");
        self.ingest(&buffer, allow_overwrite).await
    }

    // ---- Retrieval ----

    /// Metadata for one identity, or `None` when nothing is stored there.
    ///
    /// A stored archive that cannot be parsed is an `InvalidPackage` error.
    pub async fn get_metadata(
        &self,
        id: &str,
        version: &str,
    ) -> RepositoryResult<Option<PackageMetadata>> {
        if !is_valid_identity(id, version) {
            debug!(id, version, "Identity cannot name a stored archive");
            return Ok(None);
        }

        if let Some(metadata) = self.cache.get(id, version) {
            return Ok(Some(metadata));
        }

        let Some(path) = self.layout.locate(id, version).await? else {
            return Ok(None);
        };

        let metadata = self.read_metadata(&path).await?;
        self.cache.put(metadata.clone());
        Ok(Some(metadata))
    }

    /// Every stored version of `id`, highest precedence first.
    ///
    /// Unknown ids yield an empty list.
    pub async fn list_versions(&self, id: &str) -> RepositoryResult<Vec<PackageMetadata>> {
        if validate_package_id(id).is_err() {
            return Ok(Vec::new());
        }

        let files = self
            .layout
            .archive_files(&self.layout.versions_dir(id))
            .await?;
        let mut entries = self.scan(files).await;
        entries.sort_by(|(a, _), (b, _)| b.cmp(a));

        debug!(id, count = entries.len(), "Listed package versions");
        Ok(entries.into_iter().map(|(_, metadata)| metadata).collect())
    }

    /// Open the stored archive for reading.
    ///
    /// The returned file is released when dropped.
    pub async fn get_archive_stream(
        &self,
        id: &str,
        version: &str,
    ) -> RepositoryResult<Option<fs::File>> {
        if !is_valid_identity(id, version) {
            return Ok(None);
        }

        let Some(path) = self.layout.locate(id, version).await? else {
            return Ok(None);
        };
        match self.with_deadline("opening archive", fs::File::open(&path)).await {
            Ok(file) => {
                debug!(id, version, path = %path.display(), "Opened archive");
                Ok(Some(file))
            }
            Err(RepositoryError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Scan the whole store, then filter, group by id and paginate.
    pub async fn search(&self, query: &SearchQuery) -> RepositoryResult<SearchResult> {
        let mut files = Vec::new();
        for dir in self.layout.package_dirs().await? {
            files.extend(self.layout.archive_files(&dir).await?);
        }

        let entries = self.scan(files).await;
        let result = search::build_results(entries, query);

        debug!(
            query = query.query.as_deref().unwrap_or(""),
            skip = query.skip,
            take = query.take,
            total_hits = result.total_hits,
            "Search completed"
        );
        Ok(result)
    }

    // ---- Removal ----

    /// Delete one stored archive and its cache entry.
    ///
    /// Reports `NotFound` when deletion is disabled, so callers cannot tell a
    /// disabled store from a missing package through this result alone.
    pub async fn delete(&self, id: &str, version: &str) -> RepositoryResult<DeleteOutcome> {
        if !self.deletion_enabled() {
            warn!(id, version, "Deletion is disabled");
            return Ok(DeleteOutcome::NotFound);
        }
        if !is_valid_identity(id, version) {
            return Ok(DeleteOutcome::NotFound);
        }

        let _guard = self.locks.lock(id, version).await;

        let outcome = match self.layout.locate(id, version).await? {
            Some(path) => {
                let outcome = match fs::remove_file(&path).await {
                    Ok(()) => {
                        info!(id, version, path = %path.display(), "Package deleted");
                        DeleteOutcome::Removed
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => DeleteOutcome::NotFound,
                    Err(e) => return Err(e.into()),
                };
                self.forget(&path);
                outcome
            }
            None => {
                debug!(id, version, "Nothing to delete");
                DeleteOutcome::NotFound
            }
        };

        self.cache.remove(id, version);
        Ok(outcome)
    }

    /// Package, archive and byte totals for the store.
    pub async fn summary(&self) -> RepositoryResult<RepositorySummary> {
        let mut summary = RepositorySummary::default();

        for dir in self.layout.package_dirs().await? {
            let files = self.layout.archive_files(&dir).await?;
            if files.is_empty() {
                continue;
            }

            summary.package_count += 1;
            summary.version_count += files.len();
            for file in files {
                summary.total_bytes += fs::metadata(&file).await?.len();
            }
        }

        Ok(summary)
    }

    // ---- Internals ----

    /// Metadata for each archive, skipping any that cannot be read.
    async fn scan(&self, files: Vec<PathBuf>) -> Vec<(PackageVersion, PackageMetadata)> {
        let mut entries = Vec::with_capacity(files.len());

        for path in files {
            let metadata = match self.cached_or_read(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable archive");
                    continue;
                }
            };

            match PackageVersion::parse(&metadata.version) {
                Ok(version) => entries.push((version, metadata)),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        version = %metadata.version,
                        error = %e,
                        "Skipping archive with unparseable version"
                    );
                }
            }
        }

        entries
    }

    /// Drop the cache entry for the identity a stored file was written under,
    /// which may differ in case from the identity that located it.
    fn forget(&self, path: &Path) {
        if let Some(stored) = self.layout.identity_from_path(path) {
            if self.cache.remove(&stored.id, &stored.version).is_some() {
                debug!(identity = %stored, "Evicted cached metadata");
            }
        }
    }

    async fn cached_or_read(&self, path: &Path) -> RepositoryResult<PackageMetadata> {
        if let Some(identity) = self.layout.identity_from_path(path) {
            if let Some(metadata) = self.cache.get(&identity.id, &identity.version) {
                return Ok(metadata);
            }
        }

        let metadata = self.read_metadata(path).await?;
        self.cache.put(metadata.clone());
        Ok(metadata)
    }

    /// Re-derive metadata from the archive bytes on disk.
    async fn read_metadata(&self, path: &Path) -> RepositoryResult<PackageMetadata> {
        let bytes = self.with_deadline("reading archive", fs::read(path)).await?;
        let descriptor = self.parser.parse(&bytes)?;
        debug!(path = %path.display(), id = %descriptor.id, "Parsed archive from disk");

        Ok(PackageMetadata {
            id: descriptor.id,
            version: descriptor.version,
            description: descriptor.description,
            authors: descriptor.authors,
            tags: descriptor.tags,
            published: published_at(path).await,
            download_count: 0,
        })
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, future: F) -> RepositoryResult<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        let after = self.config.io_timeout();
        match tokio::time::timeout(after, future).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(operation, ?after, "I/O deadline exceeded");
                Err(RepositoryError::Timeout { operation, after })
            }
        }
    }
}

/// Modification time of the stored file.
///
/// Used both at ingest and when re-deriving, so cached and re-read metadata
/// agree. Falls back to now on filesystems without mtime.
async fn published_at(path: &Path) -> DateTime<Utc> {
    match fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No modification time, using now");
            Utc::now()
        }
    }
}
