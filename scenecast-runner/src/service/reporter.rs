//! Status reporter
//!
//! Writes the run status record to the job-metadata sink. The sink may be
//! shared with whatever launched the run, so existing keys are loaded and
//! merged rather than overwritten, and the file is replaced atomically
//! (temp file in the same directory, then rename).

use anyhow::{Context, Result};
use scenecast_core::domain::run::{RunStatusRecord, RunSummary};
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct StatusReporter {
    path: Option<PathBuf>,
}

impl StatusReporter {
    /// Creates a reporter; `None` disables persistence
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn mark_completed(&self, summary: RunSummary) -> Result<()> {
        self.write(&RunStatusRecord::completed(summary))
    }

    pub fn mark_failed_reason(&self, reason: &str) -> Result<()> {
        self.write(&RunStatusRecord::failed_with_reason(reason))
    }

    pub fn mark_failed_error(&self, error: &str) -> Result<()> {
        self.write(&RunStatusRecord::failed_with_error(error))
    }

    /// Merges the record into the sink
    pub fn write(&self, record: &RunStatusRecord) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut meta = load_existing(path);
        let JsonValue::Object(fields) =
            serde_json::to_value(record).context("Failed to serialize status record")?
        else {
            anyhow::bail!("Status record did not serialize to an object");
        };
        meta.extend(fields);

        let bytes = serde_json::to_vec_pretty(&JsonValue::Object(meta))
            .context("Failed to serialize job metadata")?;
        atomic_write(path, &bytes)?;

        info!("Updated job meta status to: {:?}", record.status);
        Ok(())
    }
}

/// Loads the sink's current object; anything unreadable starts empty
fn load_existing(path: &Path) -> Map<String, JsonValue> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return Map::new(),
    };

    match serde_json::from_str::<JsonValue>(&raw) {
        Ok(JsonValue::Object(map)) => map,
        Ok(_) => {
            warn!("Job meta at {} is not a JSON object, replacing it", path.display());
            Map::new()
        }
        Err(e) => {
            warn!("Job meta at {} is not valid JSON ({}), replacing it", path.display(), e);
            Map::new()
        }
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("meta.json");
    let tmp = dir.join(format!(".{}.tmp.{}", name, std::process::id()));

    let mut file =
        fs::File::create(&tmp).with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move job meta into {}", path.display()))?;

    Ok(())
}
