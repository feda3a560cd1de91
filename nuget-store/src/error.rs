//! # Error Handling
//!
//! Every fallible repository operation returns [`RepositoryResult`]. The
//! variants follow the registry's error taxonomy, and [`ErrorCode`] gives a
//! stable machine-readable classification for whatever layer maps errors onto
//! a transport (HTTP status codes, CLI exit codes).
//!
//! Failures met while *scanning* the store (listing versions, searching) never
//! surface here: the offending archive is logged and skipped. Only failures on
//! the specific target of a single-item operation are returned to the caller.
//!
//! ```rust
//! use nuget_store::{ErrorCode, RepositoryError};
//!
//! let err = RepositoryError::AlreadyExists {
//!     id: "Foo".to_string(),
//!     version: "1.0.0".to_string(),
//! };
//! assert_eq!(err.code(), ErrorCode::AlreadyExists);
//! assert_eq!(err.code().as_str(), "already_exists");
//! ```

use crate::descriptor::DescriptorError;
use std::time::Duration;

/// Error code classification for machine-readable error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidPackage,  // Archive unreadable or descriptor unparseable
    InvalidIdentity, // Empty or unusable id/version
    AlreadyExists,   // Conflict with the overwrite policy
    NotFound,        // Unknown identity
    IoFailure,       // Unexpected storage error
    TooLarge,        // Upload exceeded the size limit
    Timeout,         // I/O exceeded its deadline
    ConfigError,     // Configuration unreadable or malformed
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidPackage => "invalid_package",
            ErrorCode::InvalidIdentity => "invalid_identity",
            ErrorCode::AlreadyExists => "already_exists",
            ErrorCode::NotFound => "not_found",
            ErrorCode::IoFailure => "io_failure",
            ErrorCode::TooLarge => "too_large",
            ErrorCode::Timeout => "timeout",
            ErrorCode::ConfigError => "config_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository error types
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Invalid package: {0}")]
    InvalidPackage(#[from] DescriptorError),

    #[error("Invalid package identity: {0}")]
    InvalidIdentity(String),

    #[error("Package {id} {version} already exists and overwrite is disabled")]
    AlreadyExists { id: String, version: String },

    #[error("Package {id} {version} not found")]
    NotFound { id: String, version: String },

    #[error("Package exceeds the maximum allowed size of {max_bytes} bytes")]
    TooLarge { max_bytes: u64 },

    #[error("Timed out after {after:?} while {operation}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepositoryError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            RepositoryError::InvalidPackage(_) => ErrorCode::InvalidPackage,
            RepositoryError::InvalidIdentity(_) => ErrorCode::InvalidIdentity,
            RepositoryError::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            RepositoryError::NotFound { .. } => ErrorCode::NotFound,
            RepositoryError::TooLarge { .. } => ErrorCode::TooLarge,
            RepositoryError::Timeout { .. } => ErrorCode::Timeout,
            RepositoryError::Config(_) => ErrorCode::ConfigError,
            RepositoryError::Io(_) => ErrorCode::IoFailure,
        }
    }

    pub(crate) fn not_found(id: &str, version: &str) -> Self {
        RepositoryError::NotFound {
            id: id.to_string(),
            version: version.to_string(),
        }
    }
}

/// Convenient result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;
