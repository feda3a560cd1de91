//! # NuGet Package Store
//!
//! Storage engine for a NuGet-style package registry. Archives (`.nupkg`) are
//! ingested, validated and written under a storage root, then served back by
//! identity, by version history or by free-text search.
//!
//! ## Key Modules
//!
//! - [`repository`]: the engine composing everything below
//! - [`layout`]: identity to path mapping and directory enumeration
//! - [`cache`]: in-memory metadata memoization
//! - [`descriptor`]: `.nuspec` extraction behind a parser capability
//! - [`version`]: version parsing and precedence ordering
//! - [`search`]: filtering, grouping and pagination of search hits
//! - [`config`]: configuration file and environment overrides
//! - [`error`]: error taxonomy and machine-readable codes
//! - [`cli`]: the `nuget-store` admin command line
//!
//! Transport, authentication and wire formats are left to whatever layer
//! embeds the engine.

pub mod cache;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod layout;
pub mod locks;
pub mod repository;
pub mod search;
pub mod storage;
pub mod types;
pub mod validation;
pub mod version;

// Re-export key types for convenience
pub use config::RepositoryConfig;
pub use descriptor::{DescriptorError, DescriptorParser, NuspecParser, PackageDescriptor};
pub use error::{ErrorCode, RepositoryError, RepositoryResult};
pub use layout::StorageLayout;
pub use repository::PackageRepository;
pub use search::{SearchQuery, SearchResult, SearchResultItem, SearchResultVersion};
pub use types::{DeleteOutcome, PackageIdentity, PackageMetadata, RepositorySummary};
pub use validation::{ValidationError, MAX_PACKAGE_ID_LENGTH, MAX_VERSION_LENGTH};
pub use version::{PackageVersion, VersionError};
