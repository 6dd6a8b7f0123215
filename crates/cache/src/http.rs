//! Remote HTTP backend: `GET`/`PUT {endpoint}/{key}/{blob}`

use crate::store::{blob_name, validate_key, write_blob, CacheStore};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use ripple_core::{Error, Result};
use std::path::Path;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpStore {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::network(&endpoint, format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, key: &str, path: &Path) -> Result<String> {
        validate_key(key)?;
        Ok(format!("{}/{key}/{}", self.endpoint, blob_name(key, path)?))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl CacheStore for HttpStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, key: &str, dest: &Path) -> Result<bool> {
        let url = self.url(key, dest)?;
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::network(&url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status != StatusCode::NOT_FOUND {
                tracing::debug!(url = %url, status = %status, "remote cache answered non-success; treating as miss");
            }
            return Ok(false);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(&url, format!("failed to read body: {e}")))?;
        write_blob(key, dest, body).await?;
        Ok(true)
    }

    async fn store(&self, key: &str, src: &Path) -> Result<()> {
        let url = self.url(key, src)?;
        let body = tokio::fs::read(src)
            .await
            .map_err(|e| Error::file_system(src, "read blob for upload", e))?;

        let response = self
            .authorize(self.client.put(&url))
            .body(body)
            .send()
            .await
            .map_err(|e| Error::network(&url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::cache(
                "store",
                key,
                format!("PUT {url} returned {status}"),
            ));
        }
        Ok(())
    }
}
