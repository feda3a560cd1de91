//! # Package Descriptor Parsing
//!
//! A `.nupkg` is a ZIP archive carrying a `<id>.nuspec` XML document at its
//! root. The engine only needs the identity and a few descriptive fields from
//! that document, so parsing sits behind the [`DescriptorParser`] capability
//! and the engine never looks inside an archive itself.
//!
//! ```xml
//! <package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
//!   <metadata>
//!     <id>Foo</id>
//!     <version>1.0.0</version>
//!     <authors>Jane</authors>
//!     <description>a lib</description>
//!     <tags>x</tags>
//!   </metadata>
//! </package>
//! ```

use crate::version::{PackageVersion, VersionError};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

/// Upper bound on the nuspec entry, which is a few KB in practice
const MAX_DESCRIPTOR_BYTES: u64 = 1024 * 1024;

/// Identity and descriptive fields declared by an archive.
///
/// `id` and `version` may be empty when the document omits them; the engine
/// rejects those as an invalid identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub id: String,
    pub version: String,
    pub description: Option<String>,
    pub authors: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("archive is not a readable zip file: {0}")]
    NotAnArchive(#[from] zip::result::ZipError),

    #[error("archive contains no .nuspec descriptor")]
    MissingDescriptor,

    #[error("descriptor exceeds the 1 MiB limit")]
    DescriptorTooLarge,

    #[error("descriptor is not valid UTF-8")]
    Encoding,

    #[error("malformed descriptor XML: {0}")]
    Xml(String),

    #[error("descriptor has no <metadata> element")]
    MissingMetadata,

    #[error("descriptor declares an unparseable version: {0}")]
    InvalidVersion(#[from] VersionError),

    #[error("failed to read descriptor: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts a [`PackageDescriptor`] from raw archive bytes.
pub trait DescriptorParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<PackageDescriptor, DescriptorError>;
}

/// Reads the root-level `.nuspec` of a ZIP archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct NuspecParser;

impl NuspecParser {
    pub fn new() -> Self {
        Self
    }

    fn read_nuspec(bytes: &[u8]) -> Result<String, DescriptorError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

        let name = archive
            .file_names()
            .find(|name| !name.contains('/') && name.to_ascii_lowercase().ends_with(".nuspec"))
            .map(str::to_string)
            .ok_or(DescriptorError::MissingDescriptor)?;

        let entry = archive.by_name(&name)?;
        let mut buf = Vec::new();
        entry.take(MAX_DESCRIPTOR_BYTES + 1).read_to_end(&mut buf)?;
        if buf.len() as u64 > MAX_DESCRIPTOR_BYTES {
            return Err(DescriptorError::DescriptorTooLarge);
        }

        let text = String::from_utf8(buf).map_err(|_| DescriptorError::Encoding)?;
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }
}

impl DescriptorParser for NuspecParser {
    fn parse(&self, bytes: &[u8]) -> Result<PackageDescriptor, DescriptorError> {
        let document = Self::read_nuspec(bytes)?;
        let descriptor = parse_nuspec(&document)?;

        if !descriptor.version.is_empty() {
            PackageVersion::parse(&descriptor.version)?;
        }

        Ok(descriptor)
    }
}

/// Pull `package/metadata/*` fields out of a nuspec document.
fn parse_nuspec(document: &str) -> Result<PackageDescriptor, DescriptorError> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_metadata = false;
    let mut descriptor = PackageDescriptor::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                if path_is(&path, &["package", "metadata"]) {
                    saw_metadata = true;
                }
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                if path_is(&path, &["package"]) && e.local_name().as_ref() == b"metadata" {
                    saw_metadata = true;
                }
            }
            Ok(Event::Text(e)) => {
                let unescaped = e.unescape().map_err(|e| DescriptorError::Xml(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(_)) => {
                if path.len() == 3 && path_is(&path[..2], &["package", "metadata"]) {
                    let value = text.trim().to_string();
                    match path[2].as_str() {
                        "id" => descriptor.id = value,
                        "version" => descriptor.version = value,
                        "description" => descriptor.description = non_empty(value),
                        "authors" => descriptor.authors = non_empty(value),
                        "tags" => descriptor.tags = non_empty(value),
                        _ => {}
                    }
                }
                path.pop();
                text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(DescriptorError::Xml(format!(
                    "at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
        }
    }

    if !saw_metadata {
        return Err(DescriptorError::MissingMetadata);
    }

    Ok(descriptor)
}

fn path_is(path: &[String], expected: &[&str]) -> bool {
    path.len() == expected.len() && path.iter().zip(expected).all(|(a, b)| a == b)
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
