//! Local directory backend: `<root>/<key>/<blob>`

use crate::store::{blob_name, validate_key, CacheStore};
use async_trait::async_trait;
use ripple_core::{Error, Result};
use ripple_utils::copy_atomic;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &str, path: &Path) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key).join(blob_name(key, path)?))
    }
}

async fn copy_blocking(src: PathBuf, dest: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || copy_atomic(&src, &dest))
        .await
        .map_err(|e| Error::configuration(format!("copy task panicked: {e}")))?
}

#[async_trait]
impl CacheStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch(&self, key: &str, dest: &Path) -> Result<bool> {
        let blob = self.blob_path(key, dest)?;
        if !tokio::fs::try_exists(&blob).await.unwrap_or(false) {
            return Ok(false);
        }
        copy_blocking(blob, dest.to_path_buf()).await?;
        Ok(true)
    }

    async fn store(&self, key: &str, src: &Path) -> Result<()> {
        let blob = self.blob_path(key, src)?;
        if tokio::fs::try_exists(&blob).await.unwrap_or(false) {
            tracing::trace!(key = %key, blob = %blob.display(), "blob already stored");
            return Ok(());
        }
        copy_blocking(src.to_path_buf(), blob).await
    }
}
