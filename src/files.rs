//! Filesystem helpers for localized template trees: template-path
//! probing, localized path building, and sidecar extension handling.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

/// Resolve a template name relative to a base directory.
///
/// Candidates are tried in order; the first one that exists and is a
/// regular file wins. A directory hit falls through to the next
/// candidate instead of ending resolution:
/// 1. the trimmed clean path as-is,
/// 2. `<path>/index.html`,
/// 3. `<path>.html` (plain `index.html` when the path is empty).
///
/// Returns `None` when nothing matches. Read-only.
pub async fn resolve_template_name(base_dir: &Path, clean_path: &str) -> Option<String> {
    let trimmed = clean_path.trim_matches('/');

    if !trimmed.is_empty() && is_regular_file(&base_dir.join(trimmed)).await {
        return Some(trimmed.to_string());
    }

    let index_variant = if trimmed.is_empty() {
        "index.html".to_string()
    } else {
        format!("{trimmed}/index.html")
    };
    if is_regular_file(&base_dir.join(&index_variant)).await {
        return Some(index_variant);
    }

    let html_variant = if trimmed.is_empty() {
        "index.html".to_string()
    } else {
        format!("{trimmed}.html")
    };
    if is_regular_file(&base_dir.join(&html_variant)).await {
        return Some(html_variant);
    }

    None
}

/// One metadata call covers both the existence and regular-file checks.
async fn is_regular_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file(),
        Err(_) => false,
    }
}

/// Absolute path of a template in one locale: `<root>/tmpl/web/<locale>/<rel>`.
pub fn localized_path(root: &Path, locale: &str, rel: &str) -> PathBuf {
    root.join("tmpl").join("web").join(locale).join(rel)
}

/// Swap the `.html` suffix for another extension.
///
/// Paths without the expected suffix are returned unchanged, so sidecar
/// names are only ever derived from template files.
pub fn replace_ext(path: &Path, ext: &str) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_suffix(".html") {
        Some(stem) => PathBuf::from(format!("{stem}{ext}")),
        None => path.to_path_buf(),
    }
}

/// Write UTF-8 text, creating parent directories as needed.
pub async fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Last-modified time of a file as a millisecond-precision UTC ISO string.
///
/// The fixed format keeps stored timestamps lexicographically ordered,
/// which the staleness checks rely on.
pub async fn mtime_iso(path: &Path) -> Result<String> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let mtime = meta
        .modified()
        .with_context(|| format!("No modification time for {}", path.display()))?;
    Ok(to_iso(mtime.into()))
}

/// Format a timestamp the way the store keeps them.
pub fn to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
