//! Package version parsing and precedence.
//!
//! Accepts NuGet-style versions: one to four numeric components, an optional
//! `-label` made of dot-separated identifiers, and optional `+metadata`.
//!
//! Precedence:
//! - numeric components compare left to right, missing components count as 0
//! - a release sorts above any pre-release of the same numeric tuple
//! - pre-release identifiers compare pairwise: numeric ones numerically and
//!   below alphanumeric ones, alphanumeric ones case-insensitively; when one
//!   list is a prefix of the other the shorter list is lower
//! - build metadata is ignored

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const MAX_COMPONENTS: usize = 4;

/// Errors produced when a version string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("version is empty")]
    Empty,

    #[error("invalid numeric component '{0}'")]
    InvalidComponent(String),

    #[error("version has more than four numeric components")]
    TooManyComponents,

    #[error("invalid pre-release label '{0}'")]
    InvalidLabel(String),

    #[error("invalid build metadata '{0}'")]
    InvalidMetadata(String),
}

/// A parsed package version.
///
/// Equality follows precedence, so `1.0` equals `1.0.0` and `1.0.0+build`
/// equals `1.0.0`. `Display` yields the string the version was parsed from.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    original: String,
    release: [u64; MAX_COMPONENTS],
    prerelease: Vec<String>,
}

impl PackageVersion {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let original = input.trim();
        if original.is_empty() {
            return Err(VersionError::Empty);
        }

        let (without_metadata, metadata) = match original.split_once('+') {
            Some((head, metadata)) => (head, Some(metadata)),
            None => (original, None),
        };
        if let Some(metadata) = metadata {
            if !is_identifier_list(metadata) {
                return Err(VersionError::InvalidMetadata(metadata.to_string()));
            }
        }

        let (core, label) = match without_metadata.split_once('-') {
            Some((core, label)) => (core, Some(label)),
            None => (without_metadata, None),
        };

        let mut release = [0u64; MAX_COMPONENTS];
        let mut count = 0;
        for part in core.split('.') {
            if count == MAX_COMPONENTS {
                return Err(VersionError::TooManyComponents);
            }
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::InvalidComponent(part.to_string()));
            }
            release[count] = part
                .parse()
                .map_err(|_| VersionError::InvalidComponent(part.to_string()))?;
            count += 1;
        }

        let prerelease = match label {
            Some(label) if is_identifier_list(label) => {
                label.split('.').map(str::to_string).collect()
            }
            Some(label) => return Err(VersionError::InvalidLabel(label.to_string())),
            None => Vec::new(),
        };

        Ok(Self {
            original: original.to_string(),
            release,
            prerelease,
        })
    }

    /// Whether the version carries a pre-release label.
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }
}

/// Dot-separated, non-empty identifiers of ASCII alphanumerics and hyphens.
fn is_identifier_list(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|ident| {
            !ident.is_empty() && ident.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

fn compare_identifiers(a: &str, b: &str) -> Ordering {
    let numeric_a = a.bytes().all(|c| c.is_ascii_digit()).then(|| a.parse::<u64>().ok());
    let numeric_b = b.bytes().all(|c| c.is_ascii_digit()).then(|| b.parse::<u64>().ok());

    match (numeric_a, numeric_b) {
        (Some(Some(x)), Some(Some(y))) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        // Alphanumeric pairs, or numerics too large for u64
        _ => a
            .to_ascii_lowercase()
            .cmp(&b.to_ascii_lowercase())
            .then_with(|| a.len().cmp(&b.len())),
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release
            .cmp(&other.release)
            .then_with(|| match (self.is_prerelease(), other.is_prerelease()) {
                (false, false) => Ordering::Equal,
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                (true, true) => {
                    for (a, b) in self.prerelease.iter().zip(&other.prerelease) {
                        let ord = compare_identifiers(a, b);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    self.prerelease.len().cmp(&other.prerelease.len())
                }
            })
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl FromStr for PackageVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
