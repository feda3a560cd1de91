//! Common test utilities and helpers
//!
//! Builds `.nupkg` archives in memory and opens repositories on temporary
//! storage roots.

#![allow(dead_code)]

use anyhow::Result;
use nuget_store::{PackageRepository, RepositoryConfig};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use zip::write::SimpleFileOptions;

/// Test repository setup result
pub struct TestSetup {
    pub temp_dir: TempDir,
    pub repo: Arc<PackageRepository>,
}

impl TestSetup {
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Open a second repository on the same root with an empty cache.
    pub async fn reopen(&self) -> Result<PackageRepository> {
        Ok(PackageRepository::open(self.repo.config().clone()).await?)
    }
}

/// Creates a repository on a fresh temporary root with default settings
pub async fn create_test_setup() -> Result<TestSetup> {
    create_test_setup_with(|config| config).await
}

/// Creates a repository whose config is adjusted by `configure`
pub async fn create_test_setup_with<F>(configure: F) -> Result<TestSetup>
where
    F: FnOnce(RepositoryConfig) -> RepositoryConfig,
{
    let temp_dir = TempDir::new()?;
    let config = configure(RepositoryConfig::new(temp_dir.path()));
    let repo = Arc::new(PackageRepository::open(config).await?);
    Ok(TestSetup { temp_dir, repo })
}

/// In-memory `.nupkg` builder
#[derive(Debug, Clone)]
pub struct NupkgBuilder {
    id: String,
    version: String,
    description: Option<String>,
    authors: Option<String>,
    tags: Option<String>,
    payload: String,
}

impl NupkgBuilder {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            description: None,
            authors: Some("Test Author".to_string()),
            tags: None,
            payload: format!("{} {}", id, version),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn tags(mut self, tags: &str) -> Self {
        self.tags = Some(tags.to_string());
        self
    }

    /// Content of the bundled dll, to make archives with the same identity differ
    pub fn payload(mut self, payload: &str) -> Self {
        self.payload = payload.to_string();
        self
    }

    pub fn nuspec(&self) -> String {
        let optional = |tag: &str, value: &Option<String>| {
            value
                .as_deref()
                .map(|v| format!("    <{tag}>{}</{tag}>\n", quick_xml::escape::escape(v)))
                .unwrap_or_default()
        };

        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <package xmlns=\"http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd\">\n\
             \x20 <metadata>\n\
             \x20   <id>{}</id>\n\
             \x20   <version>{}</version>\n\
             {}{}{}\
             \x20 </metadata>\n\
             </package>\n",
            quick_xml::escape::escape(&self.id),
            quick_xml::escape::escape(&self.version),
            optional("authors", &self.authors),
            optional("description", &self.description),
            optional("tags", &self.tags),
        )
    }

    pub fn build(&self) -> Vec<u8> {
        // Entry names stay at the archive root even for hostile ids
        let stem = match self.id.replace(['/', '\\'], "_") {
            stem if stem.is_empty() => "package".to_string(),
            stem => stem,
        };

        build_zip(&[
            (format!("{}.nuspec", stem), self.nuspec()),
            (
                "[Content_Types].xml".to_string(),
                "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\" />"
                    .to_string(),
            ),
            (format!("lib/net8.0/{}.dll", stem), self.payload.clone()),
        ])
    }
}

/// Shorthand for a minimal archive
pub fn nupkg(id: &str, version: &str) -> Vec<u8> {
    NupkgBuilder::new(id, version).build()
}

/// Zip arbitrary entries
pub fn build_zip(entries: &[(String, String)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(name.as_str(), SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(content.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Read a stored archive back through the engine
pub async fn read_archive(repo: &PackageRepository, id: &str, version: &str) -> Option<Vec<u8>> {
    let mut file = repo.get_archive_stream(id, version).await.ok()??;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await.ok()?;
    Some(bytes)
}

/// Versions of a metadata list, in order
pub fn versions_of(list: &[nuget_store::PackageMetadata]) -> Vec<&str> {
    list.iter().map(|m| m.version.as_str()).collect()
}

/// Files under `dir` whose name ends in `.tmp`
pub fn temp_files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.to_string_lossy().ends_with(".tmp") {
                found.push(path);
            }
        }
    }
    found
}
