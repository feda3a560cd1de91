//! # Configuration Management
//!
//! Repository settings loaded from a JSON file, with environment overrides
//! applied on top. Every field is optional in the file; missing fields take
//! the defaults below (the same values as the sample `config.json` shipped
//! with the crate).
//!
//! | field | default |
//! |---|---|
//! | `packages_path` | `/packages` |
//! | `allow_overwrite` | `false` |
//! | `enable_delisting` | `true` |
//! | `max_package_size_mb` | `250` |
//! | `io_timeout_secs` | `300` |
//!
//! ```rust,no_run
//! use nuget_store::RepositoryConfig;
//!
//! // Load from file with fallback to defaults, then apply NUGET_* variables
//! let config = RepositoryConfig::load_or_default("nuget-store.json")?.with_env_overrides()?;
//! # Ok::<(), nuget_store::RepositoryError>(())
//! ```

use crate::error::{RepositoryError, RepositoryResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sample configuration shipped with the crate.
pub const SAMPLE_CONFIG: &str = include_str!("../config.json");

const ENV_PACKAGES_PATH: &str = "NUGET_PACKAGES_PATH";
const ENV_ALLOW_OVERWRITE: &str = "NUGET_ALLOW_OVERWRITE";
const ENV_ENABLE_DELISTING: &str = "NUGET_ENABLE_DELISTING";
const ENV_MAX_PACKAGE_SIZE_MB: &str = "NUGET_MAX_PACKAGE_SIZE_MB";
const ENV_IO_TIMEOUT_SECS: &str = "NUGET_IO_TIMEOUT_SECS";

/// Settings for a [`PackageRepository`](crate::PackageRepository).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Storage root holding one directory per package id
    pub packages_path: PathBuf,
    /// Whether re-ingesting an existing identity replaces it
    pub allow_overwrite: bool,
    /// Whether deletion is administratively enabled
    pub enable_delisting: bool,
    /// Upper bound on a buffered archive, in megabytes
    pub max_package_size_mb: u64,
    /// Deadline for buffering an upload or reading one archive, in seconds
    pub io_timeout_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            packages_path: PathBuf::from("/packages"),
            allow_overwrite: false,
            enable_delisting: true,
            max_package_size_mb: 250,
            io_timeout_secs: 300,
        }
    }
}

impl RepositoryConfig {
    /// Defaults rooted at `packages_path`.
    pub fn new(packages_path: impl Into<PathBuf>) -> Self {
        Self {
            packages_path: packages_path.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid configuration JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|e| {
            RepositoryError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&config_str)
            .map_err(|e| RepositoryError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Load configuration from file with fallback to defaults.
    ///
    /// A missing file yields the defaults; a file that exists but does not
    /// parse is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `NUGET_*` environment variables on top of this configuration.
    pub fn with_env_overrides(self) -> RepositoryResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> RepositoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_PACKAGES_PATH).filter(|p| !p.trim().is_empty()) {
            self.packages_path = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_ALLOW_OVERWRITE) {
            self.allow_overwrite = parse_flag(ENV_ALLOW_OVERWRITE, &value)?;
        }
        if let Some(value) = lookup(ENV_ENABLE_DELISTING) {
            self.enable_delisting = parse_flag(ENV_ENABLE_DELISTING, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_PACKAGE_SIZE_MB) {
            self.max_package_size_mb = parse_number(ENV_MAX_PACKAGE_SIZE_MB, &value)?;
        }
        if let Some(value) = lookup(ENV_IO_TIMEOUT_SECS) {
            self.io_timeout_secs = parse_number(ENV_IO_TIMEOUT_SECS, &value)?;
        }
        Ok(self)
    }

    pub fn with_packages_path(mut self, packages_path: impl Into<PathBuf>) -> Self {
        self.packages_path = packages_path.into();
        self
    }

    pub fn with_allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    pub fn with_delisting(mut self, enabled: bool) -> Self {
        self.enable_delisting = enabled;
        self
    }

    pub fn with_max_package_size_mb(mut self, megabytes: u64) -> Self {
        self.max_package_size_mb = megabytes;
        self
    }

    pub fn with_io_timeout_secs(mut self, seconds: u64) -> Self {
        self.io_timeout_secs = seconds;
        self
    }

    /// Get the maximum package size in bytes.
    pub fn max_package_size_bytes(&self) -> u64 {
        self.max_package_size_mb.saturating_mul(1024 * 1024)
    }

    /// Deadline for a single upload buffer or archive read.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

fn parse_flag(key: &str, value: &str) -> RepositoryResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(RepositoryError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_number(key: &str, value: &str) -> RepositoryResult<u64> {
    value.trim().parse().map_err(|_| {
        RepositoryError::Config(format!(
            "{} must be a non-negative integer, got '{}'",
            key, value
        ))
    })
}
