//! The backend contract shared by every cache store

use async_trait::async_trait;
use bytes::Bytes;
use ripple_core::{Error, Result};
use ripple_utils::write_atomic;
use std::path::Path;

/// Content-addressed blob store.
///
/// Blobs are addressed by `(key, file name)`: the file name of `src` on
/// store and of `dest` on fetch. Entries are never modified once written.
///
/// `fetch` returns `Ok(false)` for a clean miss. Errors mean the backend was
/// unreachable or misbehaved; callers treat them as a miss as well, but can
/// tell the two apart.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Copy the blob for `key` into `dest`
    async fn fetch(&self, key: &str, dest: &Path) -> Result<bool>;

    /// Store `src` under `key`. Storing an existing blob again is a no-op.
    async fn store(&self, key: &str, src: &Path) -> Result<()>;
}

/// Blob name for a path: its final component
pub(crate) fn blob_name(key: &str, path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::cache(
                "resolve blob name",
                key,
                format!("'{}' has no file name", path.display()),
            )
        })
}

/// Reject keys that could escape the store's namespace
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::cache("validate key", key, "invalid cache key"))
    }
}

/// Write a downloaded blob to `dest` off the async workers
pub(crate) async fn write_blob(key: &str, dest: &Path, body: Bytes) -> Result<()> {
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&dest, &body))
        .await
        .map_err(|e| Error::cache("fetch", key, format!("write task panicked: {e}")))?
}
