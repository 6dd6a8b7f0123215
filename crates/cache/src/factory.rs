//! Backend selection from a location string

use crate::http::HttpStore;
use crate::local::LocalStore;
use crate::object::{ObjectStore, S3HttpClient};
use crate::store::CacheStore;
use ripple_core::{Error, Result, RIPPLE_CACHE_TOKEN_VAR, RIPPLE_S3_ENDPOINT_VAR};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

const DEFAULT_S3_ENDPOINT: &str = "https://s3.amazonaws.com";

/// Where cache blobs live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLocation {
    Local(PathBuf),
    Http(String),
    Object { bucket: String, prefix: String },
}

impl CacheLocation {
    /// Parse `local`, a filesystem path or `file://` URL, `http(s)://...`,
    /// or `s3://bucket/prefix`. `local` maps to `default_local`.
    pub fn parse(location: &str, default_local: &Path) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() || location == "local" {
            return Ok(CacheLocation::Local(default_local.to_path_buf()));
        }
        if !location.contains("://") {
            return Ok(CacheLocation::Local(PathBuf::from(location)));
        }

        let url = Url::parse(location).map_err(|e| {
            Error::configuration(format!("invalid cache location '{location}': {e}"))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(CacheLocation::Http(location.to_string())),
            "s3" => {
                let bucket = url
                    .host_str()
                    .filter(|b| !b.is_empty())
                    .ok_or_else(|| {
                        Error::configuration(format!("cache location '{location}' has no bucket"))
                    })?
                    .to_string();
                let prefix = url.path().trim_matches('/').to_string();
                Ok(CacheLocation::Object { bucket, prefix })
            }
            "file" => url
                .to_file_path()
                .map(CacheLocation::Local)
                .map_err(|_| Error::configuration(format!("invalid file URL '{location}'"))),
            other => Err(Error::configuration(format!(
                "unsupported cache scheme '{other}' (expected http, https, s3 or a path)"
            ))),
        }
    }
}

/// Build the backend for a location string
pub fn open_store(location: &str, default_local: &Path) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match CacheLocation::parse(location, default_local)? {
        CacheLocation::Local(root) => Arc::new(LocalStore::new(root)),
        CacheLocation::Http(endpoint) => {
            let token = std::env::var(RIPPLE_CACHE_TOKEN_VAR).ok();
            Arc::new(HttpStore::new(endpoint)?.with_token(token))
        }
        CacheLocation::Object { bucket, prefix } => {
            let endpoint = std::env::var(RIPPLE_S3_ENDPOINT_VAR)
                .unwrap_or_else(|_| DEFAULT_S3_ENDPOINT.to_string());
            let client = Arc::new(S3HttpClient::new(endpoint)?);
            Arc::new(ObjectStore::new(client, bucket, prefix))
        }
    };
    tracing::debug!(backend = store.name(), location = %location, "cache store opened");
    Ok(store)
}
