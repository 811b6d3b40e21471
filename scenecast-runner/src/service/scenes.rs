//! Scene index
//!
//! Maps artifact files in an output directory back to scene numbers, so a
//! run (or a later `scenecast scenes` call) can tell which scenes produced
//! an artifact and which did not.

use anyhow::{Context, Result};
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use std::path::Path;

/// Scene number encoded in an artifact file name (`scene_<n>_...`)
pub fn scene_number(file_name: &str) -> Option<u64> {
    let rest = file_name.strip_prefix("scene_")?;
    let (number, _) = rest.split_once('_')?;
    number.parse().ok()
}

#[derive(Debug, Default, Clone)]
pub struct SceneIndex {
    scenes: BTreeMap<u64, String>,
}

impl SceneIndex {
    /// Indexes file names; on duplicates the lexicographically greatest
    /// (i.e. latest timestamp) wins
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scenes: BTreeMap<u64, String> = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            let Some(number) = scene_number(name) else {
                continue;
            };
            match scenes.get(&number) {
                Some(existing) if existing.as_str() >= name => {}
                _ => {
                    scenes.insert(number, name.to_string());
                }
            }
        }
        Self { scenes }
    }

    /// Indexes the files with `extension` in `dir`; a missing directory is empty
    pub fn scan(dir: &Path, extension: &str) -> Result<Self> {
        if !dir.exists() {
            return Ok(Self::default());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
            let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
            let path = entry.path();
            let matches_extension = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
            if !path.is_file() || !matches_extension {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }

        Ok(Self::from_names(names))
    }

    pub fn get(&self, scene: u64) -> Option<&str> {
        self.scenes.get(&scene).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn max_scene(&self) -> Option<u64> {
        self.scenes.keys().next_back().copied()
    }

    /// Scenes `1..=expected` that have no artifact
    pub fn missing(&self, expected: u64) -> Vec<u64> {
        (1..=expected).filter(|n| !self.scenes.contains_key(n)).collect()
    }

    /// Ordered `[{"scene<n>": file | "failed"}, ...]` listing
    ///
    /// Without `expected`, the listing runs up to the highest scene found.
    pub fn outputs(&self, expected: Option<u64>) -> JsonValue {
        let upper = expected.or(self.max_scene()).unwrap_or(0);
        let entries: Vec<JsonValue> = (1..=upper)
            .map(|n| {
                let key = format!("scene{}", n);
                match self.get(n) {
                    Some(file) => json!({ key: file }),
                    None => json!({ key: "failed" }),
                }
            })
            .collect();
        JsonValue::Array(entries)
    }
}
