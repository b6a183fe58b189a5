//! File-backed store of translation timestamps.
//!
//! One JSON document maps relative template paths to per-locale
//! modification timestamps. The store is owned by a single CLI
//! invocation at a time; it is not designed for concurrent writers.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Relative path -> locale -> ISO-8601 timestamp.
pub type TranslationData = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Default)]
pub struct TranslationStore {
    file: PathBuf,
    data: TranslationData,
}

impl TranslationStore {
    /// Store bound to the canonical location under the content root.
    pub fn new(root: &Path) -> Self {
        Self {
            file: root.join("var").join("polyglot-cms").join("db_translate.json"),
            data: TranslationData::new(),
        }
    }

    /// Load the JSON document from disk.
    ///
    /// A missing file is the normal first-run state and yields an empty
    /// store; a malformed file is logged and also yields an empty store.
    /// Neither case is an error.
    pub async fn load(&mut self) -> Result<()> {
        match tokio::fs::read_to_string(&self.file).await {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(data) => {
                    self.data = data;
                    info!("Loaded translations DB: {}", self.file.display());
                }
                Err(e) => {
                    self.data = TranslationData::new();
                    error!("Failed to parse translations DB {}: {}", self.file.display(), e);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.data = TranslationData::new();
                warn!("Translations DB not found, starting empty: {}", self.file.display());
            }
            Err(e) => {
                self.data = TranslationData::new();
                error!("Failed to read translations DB {}: {}", self.file.display(), e);
            }
        }
        Ok(())
    }

    /// Last known modification time for a path in one locale.
    pub fn get_mtime(&self, path: &str, locale: &str) -> Option<&str> {
        self.data.get(path).and_then(|m| m.get(locale)).map(String::as_str)
    }

    /// Record the modification time for a path in one locale.
    pub fn set_mtime(&mut self, path: &str, locale: &str, iso: &str) {
        self.data
            .entry(path.to_string())
            .or_default()
            .insert(locale.to_string(), iso.to_string());
    }

    /// Drop every locale entry for a path.
    pub fn remove(&mut self, path: &str) {
        self.data.remove(path);
    }

    /// The live internal mapping, for iteration by the sync and
    /// translation passes. Callers must not assume mutation isolation.
    pub fn data(&self) -> &TranslationData {
        &self.data
    }

    /// Persist the mapping as pretty JSON, creating the directory first.
    pub async fn save(&self) -> Result<()> {
        if let Some(dir) = self.file.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.data).context("Failed to serialize translations DB")?;
        tokio::fs::write(&self.file, json)
            .await
            .with_context(|| format!("Failed to write translations DB {}", self.file.display()))?;
        info!("Saved translations DB: {}", self.file.display());
        Ok(())
    }
}
