//! Command-line interface for the `nuget-store` binary
//!
//! Works directly on a storage root, with no server in between. Handy for
//! seeding a feed, inspecting what a server sees and cleaning up by hand.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    DeleteOutcome, PackageMetadata, PackageRepository, RepositoryConfig, RepositoryError,
    SearchQuery, SearchResult,
};

/// Largest page a single search returns
pub const MAX_TAKE: usize = 100;

/// A failure whose outcome was already printed as JSON.
///
/// Only the exit status is left to report.
#[derive(Debug, thiserror::Error)]
#[error("failure already reported on stdout")]
pub struct AlreadyReported;

/// Command-line interface for the package store
#[derive(Parser, Debug)]
#[command(name = "nuget-store")]
#[command(about = "Manage a local NuGet package store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage root, overriding config and NUGET_PACKAGES_PATH
    #[arg(long, global = true)]
    pub packages_path: Option<PathBuf>,

    /// Print JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a .nupkg file
    Push {
        file: PathBuf,
        /// Replace an existing package with the same id and version
        #[arg(long)]
        overwrite: bool,
    },
    /// Show metadata for one package version
    Show { id: String, version: String },
    /// List stored versions of a package, highest first
    Versions { id: String },
    /// Search packages by id, description or tags
    Search {
        query: Option<String>,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = crate::search::DEFAULT_TAKE)]
        take: usize,
        /// Leave out pre-release versions
        #[arg(long)]
        no_prerelease: bool,
    },
    /// Copy a stored archive out of the store
    Fetch {
        id: String,
        version: String,
        /// Destination file (defaults to <id>.<version>.nupkg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete one package version
    Delete { id: String, version: String },
    /// Show store location, settings and package counts
    Status,
}

impl Cli {
    /// Resolve configuration: file, then environment, then flags.
    pub fn resolve_config(&self) -> Result<RepositoryConfig> {
        let config = match &self.config {
            Some(path) => RepositoryConfig::load(path)?,
            None => RepositoryConfig::default(),
        };
        let mut config = config.with_env_overrides()?;

        if let Some(path) = &self.packages_path {
            config = config.with_packages_path(path);
        }
        debug!(config = ?config, "Resolved configuration");
        Ok(config)
    }
}

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    let repo = PackageRepository::open(config)
        .await
        .context("failed to open package store")?;
    let json = cli.json;

    match cli.command {
        Commands::Push { file, overwrite } => push(&repo, &file, overwrite, json).await,
        Commands::Show { id, version } => show(&repo, &id, &version, json).await,
        Commands::Versions { id } => versions(&repo, &id, json).await,
        Commands::Search {
            query,
            skip,
            take,
            no_prerelease,
        } => {
            let query = SearchQuery {
                query,
                skip,
                take: take.min(MAX_TAKE),
                include_prerelease: !no_prerelease,
            };
            search(&repo, &query, json).await
        }
        Commands::Fetch {
            id,
            version,
            output,
        } => fetch(&repo, &id, &version, output, json).await,
        Commands::Delete { id, version } => delete(&repo, &id, &version, json).await,
        Commands::Status => status(&repo, json).await,
    }
}

async fn push(repo: &PackageRepository, file: &Path, overwrite: bool, json: bool) -> Result<()> {
    let reader = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("cannot open {}", file.display()))?;
    let allow_overwrite = overwrite || repo.config().allow_overwrite;

    let metadata = repo.ingest_reader(reader, allow_overwrite).await?;
    info!(file = %file.display(), id = %metadata.id, version = %metadata.version, "Pushed package");

    if json {
        return print_json(&metadata);
    }
    println!(
        "{} {} {}",
        "✅ Stored".bright_green().bold(),
        metadata.id.bold(),
        metadata.version
    );
    Ok(())
}

async fn show(repo: &PackageRepository, id: &str, version: &str, json: bool) -> Result<()> {
    let Some(metadata) = repo.get_metadata(id, version).await? else {
        return Err(RepositoryError::not_found(id, version).into());
    };

    if json {
        return print_json(&metadata);
    }
    print_metadata(&metadata);
    Ok(())
}

async fn versions(repo: &PackageRepository, id: &str, json: bool) -> Result<()> {
    let versions = repo.list_versions(id).await?;

    if json {
        return print_json(&versions);
    }
    if versions.is_empty() {
        println!("No versions of {} stored", id);
        return Ok(());
    }
    println!("📦 {} ({} versions)", versions[0].id.bold(), versions.len());
    for metadata in &versions {
        println!(
            "  {:<24} {}",
            metadata.version,
            metadata.published.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

async fn search(repo: &PackageRepository, query: &SearchQuery, json: bool) -> Result<()> {
    let result = repo.search(query).await?;

    if json {
        return print_json(&result);
    }
    print_search(&result, query);
    Ok(())
}

async fn fetch(
    repo: &PackageRepository,
    id: &str,
    version: &str,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let Some(mut archive) = repo.get_archive_stream(id, version).await? else {
        return Err(RepositoryError::not_found(id, version).into());
    };

    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.{}.nupkg", id, version)));
    let mut file = tokio::fs::File::create(&output)
        .await
        .with_context(|| format!("cannot create {}", output.display()))?;
    let bytes = tokio::io::copy(&mut archive, &mut file).await?;

    if json {
        return print_json(&serde_json::json!({
            "id": id,
            "version": version,
            "output": output,
            "bytes": bytes,
        }));
    }
    println!("💾 Wrote {} ({} bytes)", output.display(), bytes);
    Ok(())
}

async fn delete(repo: &PackageRepository, id: &str, version: &str, json: bool) -> Result<()> {
    let outcome = repo.delete(id, version).await?;

    if json {
        print_json(&serde_json::json!({
            "id": id,
            "version": version,
            "outcome": outcome,
        }))?;
        return match outcome {
            DeleteOutcome::Removed => Ok(()),
            DeleteOutcome::NotFound => Err(AlreadyReported.into()),
        };
    }

    match outcome {
        DeleteOutcome::Removed => {
            println!("{} {} {}", "🗑  Deleted".red().bold(), id, version);
            Ok(())
        }
        DeleteOutcome::NotFound if !repo.deletion_enabled() => {
            bail!("deletion is disabled for this store")
        }
        DeleteOutcome::NotFound => Err(RepositoryError::not_found(id, version).into()),
    }
}

async fn status(repo: &PackageRepository, json: bool) -> Result<()> {
    let summary = repo.summary().await?;
    let config = repo.config();

    if json {
        return print_json(&serde_json::json!({
            "config": config,
            "summary": summary,
        }));
    }

    println!("📁 Store: {}", config.packages_path.display());
    println!("  Overwrite:   {}", on_off(config.allow_overwrite));
    println!("  Deletion:    {}", on_off(config.enable_delisting));
    println!("  Size limit:  {} MB", config.max_package_size_mb);
    println!();
    println!("📈 Package counts:");
    println!("  Packages:  {}", summary.package_count);
    println!("  Versions:  {}", summary.version_count);
    println!("  Bytes:     {}", summary.total_bytes);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_metadata(metadata: &PackageMetadata) {
    println!("{} {}", metadata.id.bold(), metadata.version);
    if let Some(description) = &metadata.description {
        println!("  Description: {}", description);
    }
    if let Some(authors) = &metadata.authors {
        println!("  Authors:     {}", authors);
    }
    if let Some(tags) = &metadata.tags {
        println!("  Tags:        {}", tags);
    }
    println!("  Published:   {}", metadata.published.to_rfc3339());
    println!("  Downloads:   {}", metadata.download_count);
}

fn print_search(result: &SearchResult, query: &SearchQuery) {
    if result.data.is_empty() {
        println!("No packages found");
        return;
    }

    let shown_from = query.skip + 1;
    let shown_to = query.skip + result.data.len();
    println!(
        "🔍 {} packages (showing {}-{})",
        result.total_hits, shown_from, shown_to
    );
    for item in &result.data {
        println!("  {} {}", item.id.bold(), item.version.bright_cyan());
        if let Some(description) = &item.description {
            println!("      {}", description);
        }
        if item.versions.len() > 1 {
            let others: Vec<&str> = item.versions.iter().map(|v| v.version.as_str()).collect();
            println!("      versions: {}", others.join(", "));
        }
    }
}

fn on_off(flag: bool) -> colored::ColoredString {
    if flag {
        "enabled".green()
    } else {
        "disabled".yellow()
    }
}
