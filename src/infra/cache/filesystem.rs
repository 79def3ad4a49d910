//! Local filesystem cache provider
//!
//! Entries live at `<root>/<key[0..2]>/<key>.tar.gz`. Writes go through a
//! uniquely named temp file that is renamed into place, so concurrent
//! writers of the same key never expose a partial entry.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::CacheProvider;
use crate::core::cache_key::CacheKey;
use crate::error::CacheError;

/// Provider identifier mixed into cache keys
pub const FILESYSTEM_PROVIDER_ID: &str = "filesystem/v1";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Cache stored under a local directory
#[derive(Debug, Clone)]
pub struct FilesystemCacheProvider {
    root: PathBuf,
    write_allowed: bool,
}

impl FilesystemCacheProvider {
    pub fn new(root: impl Into<PathBuf>, write_allowed: bool) -> Self {
        Self {
            root: root.into(),
            write_allowed,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `key`
    ///
    /// The first two key characters shard entries across subdirectories.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let key = key.as_str();
        let prefix = &key[..2.min(key.len())];
        self.root.join(prefix).join(format!("{key}.tar.gz"))
    }
}

#[async_trait]
impl CacheProvider for FilesystemCacheProvider {
    fn id(&self) -> &str {
        FILESYSTEM_PROVIDER_ID
    }

    fn is_write_allowed(&self) -> bool {
        self.write_allowed
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        tokio::fs::try_exists(self.entry_path(key))
            .await
            .map_err(|e| CacheError::ReadFailed {
                key: key.to_string(),
                error: e.to_string(),
            })
    }

    async fn get(&self, key: &CacheKey) -> Result<Vec<u8>, CacheError> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(payload) => Ok(payload),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CacheError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(CacheError::ReadFailed {
                key: key.to_string(),
                error: e.to_string(),
            }),
        }
    }

    async fn put(&self, key: &CacheKey, payload: Vec<u8>) -> Result<(), CacheError> {
        if !self.write_allowed {
            return Err(CacheError::WriteDenied {
                provider: FILESYSTEM_PROVIDER_ID.to_string(),
            });
        }

        let path = self.entry_path(key);
        let write_failed = |e: std::io::Error| CacheError::WriteFailed {
            key: key.to_string(),
            error: e.to_string(),
        };

        if tokio::fs::try_exists(&path).await.map_err(write_failed)? {
            tracing::debug!("Cache entry {key} already exists, not overwriting");
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(write_failed)?;
        }

        let temp_path = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&temp_path, &payload)
            .await
            .map_err(write_failed)?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(write_failed(e));
        }

        tracing::debug!("Stored cache entry {key} at {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache_key::combine_key;
    use tempfile::TempDir;

    fn key(seed: &str) -> CacheKey {
        combine_key(seed, FILESYSTEM_PROVIDER_ID, &[])
    }

    #[test]
    fn test_entry_path_is_sharded() {
        let provider = FilesystemCacheProvider::new("/cache", true);
        let key = key("a");
        let path = provider.entry_path(&key);

        assert!(path.starts_with(Path::new("/cache").join(&key.as_str()[..2])));
        assert!(path.to_string_lossy().ends_with(".tar.gz"));
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let temp = TempDir::new().unwrap();
        let provider = FilesystemCacheProvider::new(temp.path(), true);
        let key = key("a");

        assert!(!provider.exists(&key).await.unwrap());
        provider.put(&key, b"payload".to_vec()).await.unwrap();

        assert!(provider.exists(&key).await.unwrap());
        assert_eq!(provider.get(&key).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_found() {
        let temp = TempDir::new().unwrap();
        let provider = FilesystemCacheProvider::new(temp.path(), true);

        assert!(matches!(
            provider.get(&key("missing")).await,
            Err(CacheError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_denied_when_read_only() {
        let temp = TempDir::new().unwrap();
        let provider = FilesystemCacheProvider::new(temp.path(), false);
        let key = key("a");

        assert!(matches!(
            provider.put(&key, b"payload".to_vec()).await,
            Err(CacheError::WriteDenied { .. })
        ));
        assert!(!provider.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_entry_is_immutable() {
        let temp = TempDir::new().unwrap();
        let provider = FilesystemCacheProvider::new(temp.path(), true);
        let key = key("a");

        provider.put(&key, b"first".to_vec()).await.unwrap();
        provider.put(&key, b"second".to_vec()).await.unwrap();

        assert_eq!(provider.get(&key).await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        // A file where the cache root directory should be
        let blocker = temp.path().join("cache");
        std::fs::write(&blocker, "not a directory").unwrap();
        let provider = FilesystemCacheProvider::new(&blocker, true);

        assert!(matches!(
            provider.put(&key("a"), b"payload".to_vec()).await,
            Err(CacheError::WriteFailed { .. })
        ));
    }
}
