//! Files that live for exactly one request.
//!
//! Every staged file and job directory is removed when its guard is dropped,
//! so cleanup happens on every exit path without explicit calls.

use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

/// A file written for the duration of one job.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    /// Write `contents` to `dir/name`. The guard is only created once the
    /// write finished, so a failed write removes its partial file here.
    pub async fn write(
        dir: &Path,
        name: &str,
        contents: impl AsRef<[u8]>,
    ) -> std::io::Result<Self> {
        let path = dir.join(name);
        if let Err(e) = tokio::fs::write(&path, contents).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// Runs synchronously on the dropping worker. Unlinking does not read the
// file, so the cost is independent of upload size.
impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staged file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Directory owned by a single job, removed with everything left in it.
#[derive(Debug)]
pub struct JobDir {
    id: Uuid,
    path: PathBuf,
}

impl JobDir {
    pub async fn create(root: &Path) -> std::io::Result<Self> {
        let id = Uuid::new_v4();
        let path = root.join(format!("ollama-relay-{}", id));
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { id, path })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staging dir {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Reduce an uploaded file name to its final component. Names that would
/// escape the job directory are refused.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next()?;
    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}
