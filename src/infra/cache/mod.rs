//! Build cache providers
//!
//! A [`CacheProvider`] stores content-addressed build outputs. Two backends
//! exist: a local filesystem cache and an Azure blob container. Both behave
//! identically toward the orchestrator: reads may fail (treated as misses),
//! writes are gated by `isCacheWriteAllowed`, and entries are immutable.

pub mod blob_store;
pub mod filesystem;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::cache_config::{CacheProviderConfig, FilesystemCacheOptions};
use crate::core::cache_key::CacheKey;
use crate::error::CacheError;
use crate::infra::dirs::RepoContext;

pub use blob_store::BlobStoreCacheProvider;
pub use filesystem::FilesystemCacheProvider;

/// Storage backend for build outputs
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Stable identifier mixed into every cache key
    fn id(&self) -> &str;

    /// Whether `put` may write
    fn is_write_allowed(&self) -> bool;

    /// Human readable location of the cache
    fn location(&self) -> String;

    /// Check whether an entry exists
    async fn exists(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Fetch an entry's payload
    async fn get(&self, key: &CacheKey) -> Result<Vec<u8>, CacheError>;

    /// Store an entry's payload
    ///
    /// Fails with [`CacheError::WriteDenied`] when writes are disabled. An
    /// entry that already exists is left untouched.
    async fn put(&self, key: &CacheKey, payload: Vec<u8>) -> Result<(), CacheError>;
}

/// Folder of the local cache: env override, then `cacheFolder`, then the default
pub fn filesystem_root(options: &FilesystemCacheOptions, ctx: &RepoContext) -> PathBuf {
    if let Some(dir) = ctx.cache_dir_override() {
        return dir.to_path_buf();
    }
    match &options.cache_folder {
        Some(folder) => ctx.root().join(folder),
        None => ctx.default_cache_dir(),
    }
}

/// Create the provider selected by the cache configuration
pub fn create_provider(config: &CacheProviderConfig, ctx: &RepoContext) -> Arc<dyn CacheProvider> {
    match config {
        CacheProviderConfig::Filesystem(options) => Arc::new(FilesystemCacheProvider::new(
            filesystem_root(options, ctx),
            options.is_cache_write_allowed,
        )),
        CacheProviderConfig::AzureBlobStorage(options) => Arc::new(BlobStoreCacheProvider::new(
            options,
            ctx.cache_credential().map(ToString::to_string),
        )),
    }
}
