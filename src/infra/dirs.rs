//! Repository directory layout
//!
//! [`RepoContext`] is the explicit context handed to the loader and the cache
//! provider factory. It is built once at the CLI edge; the only environment
//! lookups happen in [`RepoContext::with_env_overrides`]:
//!
//! - `MONOBUILD_BUILD_CACHE_DIR` - Override the local cache folder
//! - `MONOBUILD_BUILD_CACHE_CREDENTIAL` - SAS token for the blob store cache

use std::env;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::MonobuildError;

/// Environment variable names
pub const ENV_CACHE_DIR: &str = "MONOBUILD_BUILD_CACHE_DIR";
pub const ENV_CACHE_CREDENTIAL: &str = "MONOBUILD_BUILD_CACHE_CREDENTIAL";

/// Paths and credentials for one repository
#[derive(Clone, Default)]
pub struct RepoContext {
    root: PathBuf,
    cache_dir_override: Option<PathBuf>,
    cache_credential: Option<String>,
}

impl std::fmt::Debug for RepoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoContext")
            .field("root", &self.root)
            .field("cache_dir_override", &self.cache_dir_override)
            .field("has_credential", &self.cache_credential.is_some())
            .finish()
    }
}

impl RepoContext {
    /// Context for a known repository root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache_dir_override: None,
            cache_credential: None,
        }
    }

    /// Find the repository root by walking up from `start`
    pub fn discover(start: &Path) -> Result<Self, MonobuildError> {
        start
            .ancestors()
            .find(|dir| dir.join(defaults::MANIFEST_FILE).is_file())
            .map(Self::new)
            .ok_or_else(|| MonobuildError::ManifestNotFound {
                path: start.display().to_string(),
            })
    }

    /// Apply overrides from the process environment
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = env::var(ENV_CACHE_DIR) {
            if !dir.is_empty() {
                self.cache_dir_override = Some(PathBuf::from(dir));
            }
        }
        if let Ok(credential) = env::var(ENV_CACHE_CREDENTIAL) {
            if !credential.is_empty() {
                self.cache_credential = Some(credential);
            }
        }
        self
    }

    /// Use a specific local cache folder
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir_override = Some(dir.into());
        self
    }

    /// Use a specific blob store credential
    #[must_use]
    pub fn with_cache_credential(mut self, credential: &str) -> Self {
        self.cache_credential = Some(credential.to_string());
        self
    }

    /// Repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(defaults::MANIFEST_FILE)
    }

    pub fn cache_config_path(&self) -> PathBuf {
        self.root.join(defaults::CACHE_CONFIG_FILE)
    }

    /// Per-project cache override file
    pub fn project_cache_config_path(&self, project_folder: &Path) -> PathBuf {
        self.root
            .join(project_folder)
            .join(defaults::PROJECT_CACHE_CONFIG_FILE)
    }

    /// Scratch directory for generated state
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(defaults::TEMP_DIR)
    }

    pub fn link_map_path(&self) -> PathBuf {
        self.temp_dir().join(defaults::LINK_MAP_FILE)
    }

    /// Directory holding per-project build logs
    pub fn logs_dir(&self) -> PathBuf {
        self.temp_dir().join("logs")
    }

    /// Local cache folder used when nothing overrides it
    pub fn default_cache_dir(&self) -> PathBuf {
        self.temp_dir().join(defaults::BUILD_CACHE_DIR)
    }

    pub fn cache_dir_override(&self) -> Option<&Path> {
        self.cache_dir_override.as_deref()
    }

    pub fn cache_credential(&self) -> Option<&str> {
        self.cache_credential.as_deref()
    }
}
