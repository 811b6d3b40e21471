//! Prompt source
//!
//! Prompts are newline-delimited; lines are trimmed and blank lines dropped.
//! Order defines submission order and scene numbering.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

pub fn parse_prompts(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads prompts from a file; a missing file yields no prompts
pub async fn load_prompts(path: &Path) -> Result<Vec<String>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        warn!("Prompt file not found: {}", path.display());
        return Ok(Vec::new());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
    let prompts = parse_prompts(&content);

    info!("Loaded {} prompts from {}", prompts.len(), path.display());
    Ok(prompts)
}
