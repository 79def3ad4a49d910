//! Azure blob storage cache provider
//!
//! Maps each cache key to the blob `<prefix>/<key>` in one container and
//! talks to the Blob REST API directly. Authorization is a SAS token
//! resolved from the environment by the caller; it never comes from the
//! cache configuration file.

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::CacheProvider;
use crate::config::defaults;
use crate::core::cache_config::AzureBlobStorageOptions;
use crate::core::cache_key::CacheKey;
use crate::error::CacheError;

/// Provider identifier mixed into cache keys
pub const BLOB_STORE_PROVIDER_ID: &str = "azure-blob-storage/v1";

/// REST API version sent with every request
const API_VERSION: &str = "2021-08-06";

/// Cache stored in an Azure blob container
#[derive(Clone)]
pub struct BlobStoreCacheProvider {
    client: reqwest::Client,
    /// Container URL without trailing slash
    endpoint: String,
    prefix: Option<String>,
    /// SAS token, without leading `?`
    credential: Option<String>,
    write_allowed: bool,
    retry_budget: Duration,
    /// Set after the first connection failure; shared between clones
    unreachable: Arc<AtomicBool>,
}

impl fmt::Debug for BlobStoreCacheProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStoreCacheProvider")
            .field("endpoint", &self.endpoint)
            .field("prefix", &self.prefix)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("write_allowed", &self.write_allowed)
            .finish_non_exhaustive()
    }
}

impl BlobStoreCacheProvider {
    /// Create a provider for the configured account and container
    pub fn new(options: &AzureBlobStorageOptions, credential: Option<String>) -> Self {
        let endpoint = format!(
            "https://{}.{}/{}",
            options.storage_account_name,
            options.azure_environment.blob_host_suffix(),
            options.storage_container_name
        );

        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .connect_timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint,
            prefix: options
                .blob_prefix
                .as_deref()
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            credential: credential
                .map(|c| c.trim_start_matches('?').to_string())
                .filter(|c| !c.is_empty()),
            write_allowed: options.is_cache_write_allowed,
            retry_budget: Duration::from_secs(defaults::CACHE_RETRY_BUDGET_SECS),
            unreachable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Point the provider at a different container URL
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    /// Limit the total time spent retrying one request
    #[must_use]
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Blob name for a key
    pub fn blob_name(&self, key: &CacheKey) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }

    fn blob_url(&self, key: &CacheKey) -> String {
        let url = format!("{}/{}", self.endpoint, self.blob_name(key));
        match &self.credential {
            Some(sas) => format!("{url}?{sas}"),
            None => url,
        }
    }

    /// Whether a connection failure disabled the provider for this session
    pub fn is_unreachable(&self) -> bool {
        self.unreachable.load(Ordering::Relaxed)
    }

    fn mark_unreachable(&self, error: &str) {
        if !self.unreachable.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "Blob storage cache at {} is unreachable, building without it: {error}",
                self.endpoint
            );
        }
    }

    /// Send a request, retrying request timeouts, 5xx and 429
    ///
    /// A connection failure is not retried. It marks the store unreachable
    /// and every later request fails immediately.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response, String>
    where
        F: Fn() -> RequestBuilder,
    {
        if self.is_unreachable() {
            return Err(format!("{} is unreachable", self.endpoint));
        }

        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(self.retry_budget),
            ..ExponentialBackoff::default()
        };
        let build = &build;

        backoff::future::retry(policy, || {
            let request = build().header("x-ms-version", API_VERSION);
            async move {
                match request.send().await {
                    Ok(response) if is_transient(response.status()) => Err(
                        backoff::Error::transient(format!("server returned {}", response.status())),
                    ),
                    Ok(response) => Ok(response),
                    Err(e) if e.is_connect() => {
                        let error = e.to_string();
                        self.mark_unreachable(&error);
                        Err(backoff::Error::permanent(error))
                    }
                    Err(e) if e.is_timeout() => Err(backoff::Error::transient(e.to_string())),
                    Err(e) => Err(backoff::Error::permanent(e.to_string())),
                }
            }
        })
        .await
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl CacheProvider for BlobStoreCacheProvider {
    fn id(&self) -> &str {
        BLOB_STORE_PROVIDER_ID
    }

    fn is_write_allowed(&self) -> bool {
        self.write_allowed
    }

    fn location(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{prefix}", self.endpoint),
            None => self.endpoint.clone(),
        }
    }

    async fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let url = self.blob_url(key);
        let response = self
            .send_with_retry(|| self.client.head(&url))
            .await
            .map_err(|error| CacheError::ReadFailed {
                key: key.to_string(),
                error,
            })?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(CacheError::ReadFailed {
                key: key.to_string(),
                error: format!("unexpected status {s}"),
            }),
        }
    }

    async fn get(&self, key: &CacheKey) -> Result<Vec<u8>, CacheError> {
        let url = self.blob_url(key);
        let read_failed = |error: String| CacheError::ReadFailed {
            key: key.to_string(),
            error,
        };

        let response = self
            .send_with_retry(|| self.client.get(&url))
            .await
            .map_err(read_failed)?;

        match response.status() {
            s if s.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| read_failed(e.to_string()))?;
                tracing::debug!("Downloaded {} bytes for cache entry {key}", bytes.len());
                Ok(bytes.to_vec())
            }
            StatusCode::NOT_FOUND => Err(CacheError::NotFound {
                key: key.to_string(),
            }),
            s => Err(read_failed(format!("unexpected status {s}"))),
        }
    }

    async fn put(&self, key: &CacheKey, payload: Vec<u8>) -> Result<(), CacheError> {
        if !self.write_allowed {
            return Err(CacheError::WriteDenied {
                provider: BLOB_STORE_PROVIDER_ID.to_string(),
            });
        }
        if self.credential.is_none() {
            tracing::warn!("No blob storage credential available, cache writes are disabled");
            return Err(CacheError::WriteDenied {
                provider: BLOB_STORE_PROVIDER_ID.to_string(),
            });
        }

        let url = self.blob_url(key);
        let response = self
            .send_with_retry(|| {
                self.client
                    .put(&url)
                    .header("x-ms-blob-type", "BlockBlob")
                    .header("If-None-Match", "*")
                    .body(payload.clone())
            })
            .await
            .map_err(|error| CacheError::WriteFailed {
                key: key.to_string(),
                error,
            })?;

        match response.status() {
            s if s.is_success() => {
                tracing::debug!("Uploaded cache entry {}", self.blob_name(key));
                Ok(())
            }
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                tracing::debug!("Cache entry {key} already exists, not overwriting");
                Ok(())
            }
            s => Err(CacheError::WriteFailed {
                key: key.to_string(),
                error: format!("unexpected status {s}"),
            }),
        }
    }
}
