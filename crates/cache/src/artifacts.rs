//! Cache protocol for task outputs on top of any [`CacheStore`]
//!
//! An entry under a fingerprint key holds `manifest.json` and, for tasks
//! with outputs, `outputs.tar.gz`. The archive is stored before the
//! manifest, so a fetched manifest implies the archive was stored too.

use crate::archive::ArtifactPackager;
use crate::fingerprint::{outputs_fresh, InputFilter};
use crate::manifest::{read_manifest, write_manifest};
use crate::store::CacheStore;
use ripple_core::{CacheEntry, Error, Result, TaskSpec, MANIFEST_NAME, OUTPUTS_ARCHIVE_NAME};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of a restore attempt that did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Outputs restored and verified fresh (or the task has no outputs)
    Hit,
    /// No entry for the key, or its archive was unreadable
    Miss,
    /// Outputs were restored but look older than the inputs
    Stale,
}

impl RestoreOutcome {
    pub fn is_hit(self) -> bool {
        self == RestoreOutcome::Hit
    }
}

#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn CacheStore>,
    packager: ArtifactPackager,
    staging: PathBuf,
    filter: InputFilter,
}

impl ArtifactCache {
    /// `staging` is a scratch directory for archives and manifests in flight
    pub fn new(store: Arc<dyn CacheStore>, root: impl Into<PathBuf>, staging: impl Into<PathBuf>) -> Self {
        Self {
            store,
            packager: ArtifactPackager::new(root),
            staging: staging.into(),
            filter: InputFilter::default(),
        }
    }

    /// Paths skipped when fingerprinting and checking freshness
    #[must_use]
    pub fn with_input_filter(mut self, filter: InputFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn input_filter(&self) -> &InputFilter {
        &self.filter
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Try to satisfy `task` from the cache entry `key`
    pub async fn restore(&self, task: &TaskSpec, key: &str) -> Result<RestoreOutcome> {
        tokio::fs::create_dir_all(&self.staging)
            .await
            .map_err(|e| Error::file_system(&self.staging, "create staging dir", e))?;
        // Private scratch dir so concurrent restores of one key never collide
        let scratch = tempfile::Builder::new()
            .prefix("fetch-")
            .tempdir_in(&self.staging)
            .map_err(|e| Error::file_system(&self.staging, "create fetch dir", e))?;

        let manifest_path = scratch.path().join(MANIFEST_NAME);
        if !self.store.fetch(key, &manifest_path).await? {
            return Ok(RestoreOutcome::Miss);
        }
        let entry = read_manifest(&manifest_path)?;
        if entry.key != key {
            return Err(Error::cache(
                "restore",
                key,
                format!("manifest belongs to key '{}'", entry.key),
            ));
        }

        if !task.has_outputs() {
            return Ok(RestoreOutcome::Hit);
        }

        let archive_path = scratch.path().join(OUTPUTS_ARCHIVE_NAME);
        if !self.store.fetch(key, &archive_path).await? {
            return Ok(RestoreOutcome::Miss);
        }

        let packager = self.packager.clone();
        let unpacked = tokio::task::spawn_blocking(move || packager.unpack(&archive_path))
            .await
            .map_err(|e| Error::cache("unpack", key, format!("unpack task panicked: {e}")))??;
        if !unpacked {
            return Ok(RestoreOutcome::Miss);
        }

        if outputs_fresh(task, &self.filter) {
            Ok(RestoreOutcome::Hit)
        } else {
            Ok(RestoreOutcome::Stale)
        }
    }

    /// Record a successful run of `task` under `key`
    pub async fn save(&self, task: &TaskSpec, key: &str) -> Result<CacheEntry> {
        let packager = self.packager.clone();
        let staging = self.staging.clone();
        let owned_task = task.clone();
        let owned_key = key.to_string();

        let (archive, entry, manifest) = tokio::task::spawn_blocking(move || -> Result<_> {
            let archive = packager.pack(&owned_task, &owned_key, &staging)?;
            let outputs = owned_task
                .outputs
                .iter()
                .map(|o| relative_to(packager.root(), &o.path))
                .collect();
            let entry = CacheEntry::new(owned_key, owned_task.name.clone(), outputs);
            let manifest = write_manifest(&staging, &entry)?;
            Ok((archive, entry, manifest))
        })
        .await
        .map_err(|e| Error::cache("store", key, format!("pack task panicked: {e}")))??;

        if let Some(archive) = &archive {
            self.store.store(key, archive).await?;
        }
        self.store.store(key, &manifest).await?;

        let _ = tokio::fs::remove_dir_all(self.staging.join(key)).await;
        Ok(entry)
    }
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
