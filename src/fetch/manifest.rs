use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use super::catalog::Resource;

/// What was fetched this run and where it was saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: Option<String>,
    pub format: Option<String>,
    pub created: Option<String>,
    pub last_modified: Option<String>,
    pub url: String,
    pub saved_to: String,
}

impl ManifestEntry {
    pub fn new(res: &Resource, url: &str, saved_to: &Path) -> Self {
        Self {
            name: res.name.clone(),
            format: res.format.clone(),
            created: res.created.clone(),
            last_modified: res.last_modified.clone(),
            url: url.to_string(),
            saved_to: saved_to.display().to_string(),
        }
    }
}

/// Overwrite `path` with `entries` as a pretty-printed JSON array.
pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    fs::write(path, json).with_context(|| format!("writing manifest {}", path.display()))
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading manifest {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing manifest {}", path.display()))
}
