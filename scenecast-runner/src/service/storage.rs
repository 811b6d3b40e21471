//! Artifact storage service
//!
//! Persists downloaded artifacts under the output directory with
//! collision-resistant names: `scene_<jobId>_<timestampMillis>_<token>.<ext>`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Service trait for saving artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Saves the artifact of a job
    ///
    /// # Returns
    /// The path the artifact was written to
    async fn save(&self, job_id: u64, bytes: &[u8]) -> Result<PathBuf>;
}

/// Builds the file name for a job's artifact
pub fn artifact_file_name(job_id: u64, extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!("scene_{}_{}_{}.{}", job_id, millis, &token[..8], extension)
}

/// Filesystem implementation of ArtifactStore
pub struct FsArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl FsArtifactStore {
    /// Creates a store writing `.mp4` files under `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self::with_extension(dir, "mp4")
    }

    pub fn with_extension(dir: PathBuf, extension: impl Into<String>) -> Self {
        Self {
            dir,
            extension: extension.into(),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(&self, job_id: u64, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(artifact_file_name(job_id, &self.extension));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Artifact saved: {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}
