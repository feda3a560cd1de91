//! # Identity Validation
//!
//! Package ids and versions become directory and file names under the storage
//! root, so anything that reaches the filesystem is checked here first. A
//! value that passes cannot contain path separators, parent-directory
//! segments, control characters or anything outside a small ASCII alphabet.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum allowed package id length
pub const MAX_PACKAGE_ID_LENGTH: usize = 100;

/// Maximum allowed version string length
pub const MAX_VERSION_LENGTH: usize = 64;

/// Error types for identity validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is empty")]
    Empty { field: &'static str },

    #[error("{field} too long: {actual} exceeds maximum {max}")]
    TooLong {
        field: &'static str,
        actual: usize,
        max: usize,
    },

    #[error("Invalid characters in {field}: '{input}'")]
    InvalidCharacters { field: &'static str, input: String },
}

fn package_id_regex() -> &'static Regex {
    static PACKAGE_ID_REGEX: OnceLock<Regex> = OnceLock::new();
    PACKAGE_ID_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_]+([.-][A-Za-z0-9_]+)*$").unwrap_or_else(|e| {
            panic!("package id regex failed to compile: {}", e)
        })
    })
}

/// Validate a package id.
///
/// Ids are runs of ASCII word characters joined by single `.` or `-`, so they
/// can never be `.`, `..` or start with a separator.
pub fn validate_package_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::Empty { field: "package id" });
    }

    if id.len() > MAX_PACKAGE_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: "package id",
            actual: id.len(),
            max: MAX_PACKAGE_ID_LENGTH,
        });
    }

    if !package_id_regex().is_match(id) {
        return Err(ValidationError::InvalidCharacters {
            field: "package id",
            input: id.to_string(),
        });
    }

    Ok(())
}

/// Validate a version string for use as a path segment.
///
/// This is a character-level check only; precedence parsing lives in
/// [`PackageVersion`](crate::PackageVersion).
pub fn validate_version(version: &str) -> Result<(), ValidationError> {
    if version.is_empty() {
        return Err(ValidationError::Empty { field: "version" });
    }

    if version.len() > MAX_VERSION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "version",
            actual: version.len(),
            max: MAX_VERSION_LENGTH,
        });
    }

    let allowed = version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'));
    if !allowed || version.contains("..") || version.starts_with('.') {
        return Err(ValidationError::InvalidCharacters {
            field: "version",
            input: version.to_string(),
        });
    }

    Ok(())
}

/// Whether `(id, version)` can name a stored archive.
pub fn is_valid_identity(id: &str, version: &str) -> bool {
    validate_package_id(id).is_ok() && validate_version(version).is_ok()
}
