//! On-disk model cache — the offline fallback for discovery.
//!
//! One JSON object keyed by provider. Each successful discovery replaces
//! its provider's entry wholesale; entries are never merged. The file is
//! best-effort: unreadable or malformed content reads as empty.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::atomic_write;
use crate::providers::Model;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskEntry {
    pub models: Vec<Model>,
    /// Epoch millis of the discovery that produced `models`.
    pub timestamp: i64,
}

pub type DiskCacheFile = BTreeMap<String, DiskEntry>;

pub struct DiskCache {
    path: PathBuf,
}

impl DiskCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry on disk; empty when the file is missing or unreadable.
    pub fn load_all(&self) -> DiskCacheFile {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return DiskCacheFile::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "Cannot read model cache: {}", e);
                return DiskCacheFile::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring malformed model cache: {}", e);
                DiskCacheFile::new()
            }
        }
    }

    pub fn get(&self, provider_key: &str) -> Option<DiskEntry> {
        self.load_all().remove(provider_key)
    }

    /// Overwrite one provider's entry, leaving the others untouched.
    pub fn store(&self, provider_key: &str, models: &[Model], timestamp: i64) -> Result<()> {
        let mut file = self.load_all();
        file.insert(
            provider_key.to_string(),
            DiskEntry {
                models: models.to_vec(),
                timestamp,
            },
        );
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize model cache")?;
        atomic_write(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
