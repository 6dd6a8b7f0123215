//! `manifest.json`: the record of a stored cache entry

use ripple_core::{CacheEntry, Error, Result, MANIFEST_NAME};
use ripple_utils::write_atomic_string;
use std::path::{Path, PathBuf};

/// Write `<staging>/<key>/manifest.json` and return its path
pub fn write_manifest(staging: &Path, entry: &CacheEntry) -> Result<PathBuf> {
    let path = staging.join(&entry.key).join(MANIFEST_NAME);
    let content = serde_json::to_string_pretty(entry)?;
    write_atomic_string(&path, &content)?;
    Ok(path)
}

/// Read a manifest fetched from a store
pub fn read_manifest(path: &Path) -> Result<CacheEntry> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::file_system(path, "read cache manifest", e))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::archive(path, format!("invalid cache manifest: {e}")))
}
