//! Atomic file writes.
//!
//! Bytes go to a hidden temp file in the destination directory, are synced,
//! then renamed over the destination. Readers see either the previous file or
//! the complete new one. If the write fails or the future is dropped midway,
//! the temp file is removed and the destination is untouched.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Removes the temp file unless the write completed.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
    }
}

/// Write `content` to `path` atomically, creating parent directories.
pub async fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent).await?;
    debug!(parent = %parent.display(), "Ensured parent directory");

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let mut guard = TempFileGuard::new(temp_path.clone());
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await?;
    guard.disarm();

    info!(path = %path.display(), size = content.len(), "File saved successfully");
    Ok(())
}
