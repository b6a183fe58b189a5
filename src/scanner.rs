//! Template-tree scanning and store reconciliation.

use crate::config::Config;
use crate::files::to_iso;
use crate::store::TranslationStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Fresh result of one scan: relative path -> ISO mtime.
pub type ScanResult = BTreeMap<String, String>;

/// Walk a locale directory and collect every `.html` file with its
/// last-modified time. Relative paths use forward slashes.
pub fn scan_templates(base_dir: &Path) -> Result<ScanResult> {
    let mut result = ScanResult::new();
    for entry in WalkDir::new(base_dir) {
        let entry = entry.with_context(|| format!("Failed to walk {}", base_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !entry.file_name().to_string_lossy().ends_with(".html") {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(base_dir)
            .context("Walked entry outside the base directory")?
            .to_string_lossy()
            .replace('\\', "/");
        let mtime = entry
            .metadata()
            .with_context(|| format!("Failed to stat {}", entry.path().display()))?
            .modified()
            .with_context(|| format!("No modification time for {}", entry.path().display()))?;
        result.insert(rel, to_iso(DateTime::<Utc>::from(mtime)));
    }
    Ok(result)
}

/// Reconcile the store against one scan of the base-locale tree.
///
/// Scanned paths whose on-disk mtime differs from (or is absent in) the
/// stored base-locale entry get updated; store entries for paths the
/// scan no longer sees are removed. Full pass, O(scanned + stored).
pub fn sync_store(store: &mut TranslationStore, scanned: &ScanResult, base_locale: &str) {
    for (rel_path, new_mtime) in scanned {
        let stale = match store.get_mtime(rel_path, base_locale) {
            Some(old) => old != new_mtime,
            None => true,
        };
        if stale {
            store.set_mtime(rel_path, base_locale, new_mtime);
            info!("Updated timestamp for: {rel_path}");
        }
    }

    let obsolete: Vec<String> = store
        .data()
        .keys()
        .filter(|p| !scanned.contains_key(*p))
        .cloned()
        .collect();
    for rel_path in obsolete {
        store.remove(&rel_path);
        info!("Removed obsolete entry: {rel_path}");
    }

    info!("Translation DB synchronized with {} template(s).", scanned.len());
}

/// Scan the base-locale tree and reconcile the store with it.
///
/// A missing base directory is logged and leaves the store untouched.
pub fn sync_with_filesystem(config: &Config, store: &mut TranslationStore) -> Result<()> {
    let base_locale = &config.locale_base_translate;
    let dir = config.locale_dir(base_locale);
    if !dir.is_dir() {
        warn!("Base locale directory not found: {}", dir.display());
        return Ok(());
    }
    let scanned = scan_templates(&dir)?;
    sync_store(store, &scanned, base_locale);
    Ok(())
}
