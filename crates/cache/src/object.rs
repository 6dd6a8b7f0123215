//! Object-storage backend (`s3://bucket/prefix`)
//!
//! Objects are named `<prefix>/<key>/<blob>`. Every network call is retried
//! with a short backoff before the operation gives up.

use crate::store::{blob_name, validate_key, write_blob, CacheStore};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use ripple_core::{Error, Result};
use ripple_utils::{retry, RetryConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Minimal object-store API the backend needs
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// `Ok(None)` when the object does not exist
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>>;

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;
}

/// Path-style client for S3-compatible endpoints (`{endpoint}/{bucket}/{key}`).
///
/// Requests are unsigned: the bucket must allow anonymous access or sit
/// behind a signing proxy.
#[derive(Debug, Clone)]
pub struct S3HttpClient {
    client: Client,
    endpoint: String,
}

impl S3HttpClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::network(&endpoint, format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    fn url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.endpoint)
    }
}

/// Server errors and throttling are worth retrying, other statuses are not
fn status_error(url: &str, key: &str, operation: &str, status: StatusCode) -> Error {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Error::network(url, format!("{operation} returned {status}"))
    } else {
        Error::cache(operation, key, format!("{url} returned {status}"))
    }
}

#[async_trait]
impl ObjectStoreClient for S3HttpClient {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>> {
        let url = self.url(bucket, key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::network(&url, e.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(&url, key, "get object", status));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(&url, e.to_string()))?;
        Ok(Some(body))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let url = self.url(bucket, key);
        let response = self
            .client
            .put(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::network(&url, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(&url, key, "put object", status));
        }
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let url = self.url(bucket, key);
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| Error::network(&url, e.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(status_error(&url, key, "head object", status));
        }
        Ok(true)
    }
}

pub struct ObjectStore {
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
    prefix: String,
    retry: RetryConfig,
}

impl ObjectStore {
    pub fn new(
        client: Arc<dyn ObjectStoreClient>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            retry: RetryConfig::for_object_store(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn object_key(&self, key: &str, path: &Path) -> Result<String> {
        validate_key(key)?;
        let blob = blob_name(key, path)?;
        Ok(if self.prefix.is_empty() {
            format!("{key}/{blob}")
        } else {
            format!("{}/{key}/{blob}", self.prefix)
        })
    }
}

#[async_trait]
impl CacheStore for ObjectStore {
    fn name(&self) -> &str {
        "object"
    }

    async fn fetch(&self, key: &str, dest: &Path) -> Result<bool> {
        let object_key = self.object_key(key, dest)?;
        let body = retry(&self.retry, || {
            self.client.get_object(&self.bucket, &object_key)
        })
        .await?;

        match body {
            Some(body) => {
                write_blob(key, dest, body).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn store(&self, key: &str, src: &Path) -> Result<()> {
        let object_key = self.object_key(key, src)?;
        let exists = retry(&self.retry, || {
            self.client.object_exists(&self.bucket, &object_key)
        })
        .await?;
        if exists {
            tracing::trace!(key = %key, object = %object_key, "object already stored");
            return Ok(());
        }

        let body = Bytes::from(
            tokio::fs::read(src)
                .await
                .map_err(|e| Error::file_system(src, "read blob for upload", e))?,
        );
        retry(&self.retry, || {
            self.client
                .put_object(&self.bucket, &object_key, body.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory object store that fails the first `failures` calls
    #[derive(Default)]
    struct FlakyClient {
        objects: Mutex<HashMap<String, Bytes>>,
        failures: AtomicUsize,
        calls: AtomicUsize,
        puts: AtomicUsize,
    }

    impl FlakyClient {
        fn failing(failures: usize) -> Self {
            Self {
                failures: AtomicUsize::new(failures),
                ..Default::default()
            }
        }

        fn maybe_fail(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::network("s3://test", "connection reset"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ObjectStoreClient for FlakyClient {
        async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>> {
            self.maybe_fail()?;
            Ok(self.objects.lock().unwrap().get(&format!("{bucket}/{key}")).cloned())
        }

        async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
            self.maybe_fail()?;
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.objects
                .lock()
                .unwrap()
                .insert(format!("{bucket}/{key}"), body);
            Ok(())
        }

        async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
            self.maybe_fail()?;
            Ok(self
                .objects
                .lock()
                .unwrap()
                .contains_key(&format!("{bucket}/{key}")))
        }
    }

    fn store_with(client: Arc<FlakyClient>) -> ObjectStore {
        ObjectStore::new(client, "bucket", "/ci/cache/").with_retry(RetryConfig::immediate(2))
    }

    #[tokio::test]
    async fn test_round_trip_under_prefix() {
        let client = Arc::new(FlakyClient::default());
        let store = store_with(client.clone());
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("outputs.tar.gz");
        std::fs::write(&src, b"tarball").unwrap();

        store.store("k1", &src).await.unwrap();
        assert!(client
            .objects
            .lock()
            .unwrap()
            .contains_key("bucket/ci/cache/k1/outputs.tar.gz"));

        let dest = temp.path().join("restored").join("outputs.tar.gz");
        assert!(store.fetch("k1", &dest).await.unwrap());
        assert_eq!(std::fs::read(dest).unwrap(), b"tarball");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let client = Arc::new(FlakyClient::failing(2));
        let store = store_with(client.clone());
        let temp = TempDir::new().unwrap();

        let hit = store
            .fetch("k1", &temp.path().join("manifest.json"))
            .await
            .unwrap();
        assert!(!hit);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_two_retries() {
        let client = Arc::new(FlakyClient::failing(3));
        let store = store_with(client.clone());
        let temp = TempDir::new().unwrap();

        let result = store.fetch("k1", &temp.path().join("manifest.json")).await;
        assert!(result.is_err());
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_store_twice_uploads_once() {
        let client = Arc::new(FlakyClient::default());
        let store = store_with(client.clone());
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("manifest.json");
        std::fs::write(&src, b"{}").unwrap();

        store.store("k1", &src).await.unwrap();
        store.store("k1", &src).await.unwrap();
        assert_eq!(client.puts.load(Ordering::SeqCst), 1);
    }
}
