//! # Storage Layout
//!
//! Maps identities to paths under the storage root and enumerates what is
//! stored there:
//!
//! ```text
//! <root>/<lowercase id>/<lowercase version>/<id>.<version>.nupkg
//! ```
//!
//! Directory segments are lowercased so the layout behaves the same on
//! case-sensitive and case-insensitive filesystems. The filename keeps the
//! casing the package declared. The directory tree is the only index.

use crate::types::PackageIdentity;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// File extension of stored archives
pub const ARCHIVE_EXTENSION: &str = "nupkg";

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical archive path for an identity.
    ///
    /// Callers must validate `id` and `version` first; this function only
    /// joins segments.
    pub fn path_for(&self, id: &str, version: &str) -> PathBuf {
        self.versions_dir(id)
            .join(version.to_lowercase())
            .join(format!("{}.{}.{}", id, version, ARCHIVE_EXTENSION))
    }

    /// The stored archive for an identity, whatever id casing it was stored
    /// under.
    ///
    /// Tries the canonical path first, then scans the version directory for
    /// a filename matching without regard to case.
    pub async fn locate(&self, id: &str, version: &str) -> io::Result<Option<PathBuf>> {
        let canonical = self.path_for(id, version);
        if fs::try_exists(&canonical).await? {
            return Ok(Some(canonical));
        }

        let (Some(dir), Some(expected)) = (
            canonical.parent(),
            canonical.file_name().and_then(|name| name.to_str()),
        ) else {
            return Ok(None);
        };

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.eq_ignore_ascii_case(expected));
            if matches && entry.file_type().await?.is_file() {
                debug!(id, version, path = %entry.path().display(), "Located archive by case-insensitive name");
                return Ok(Some(entry.path()));
            }
        }

        Ok(None)
    }

    /// Directory holding every stored version of `id`.
    pub fn versions_dir(&self, id: &str) -> PathBuf {
        self.root.join(id.to_lowercase())
    }

    /// Top-level directories under the root, one per distinct id, sorted by
    /// path. A missing root yields an empty list.
    pub async fn package_dirs(&self) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "Storage root does not exist");
                return Ok(dirs);
            }
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }

        dirs.sort();
        Ok(dirs)
    }

    /// Every `*.nupkg` file below `dir`, recursively, sorted by path.
    ///
    /// A missing `dir` yields an empty list.
    pub async fn archive_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let walk_root = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || walk_archives(&walk_root))
            .await
            .map_err(io::Error::other)??;

        debug!(dir = %dir.display(), count = files.len(), "Enumerated archives");
        Ok(files)
    }

    /// Recover the identity a canonical archive path was built from.
    ///
    /// Returns `None` for paths that do not follow the layout (stray files,
    /// hand-copied archives), which callers then parse from their bytes.
    pub fn identity_from_path(&self, path: &Path) -> Option<PackageIdentity> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut segments = relative.iter().map(|s| s.to_str());
        let id_dir = segments.next()??;
        let version_dir = segments.next()??;
        let file_name = segments.next()??;
        if segments.next().is_some() {
            return None;
        }

        let stem = file_name.strip_suffix(&format!(".{}", ARCHIVE_EXTENSION))?;
        let id = stem.get(..id_dir.len())?;
        let version = stem.get(id_dir.len()..)?.strip_prefix('.')?;

        let matches_dirs =
            id.eq_ignore_ascii_case(id_dir) && version.to_lowercase() == version_dir;
        matches_dirs.then(|| PackageIdentity::new(id, version))
    }
}

fn walk_archives(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 && is_not_found(&e) => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        if entry.file_type().is_file() && is_archive(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn is_not_found(error: &walkdir::Error) -> bool {
    error
        .io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}
