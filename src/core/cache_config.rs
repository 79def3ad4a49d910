//! Build cache configuration
//!
//! Parses `common/config/build-cache.json` and per-project overrides into
//! typed structures. Exactly one provider block may be present and it must
//! match `cacheProvider`.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::config::defaults;
use crate::error::ConfigurationError;

/// Provider selector
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CacheProviderKind {
    Filesystem,
    AzureBlobStorage,
}

impl CacheProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::AzureBlobStorage => "azure-blob-storage",
        }
    }
}

/// Azure cloud the storage account lives in
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AzureEnvironment {
    #[default]
    AzurePublicCloud,
    AzureChina,
    AzureGermany,
    AzureGovernment,
}

impl AzureEnvironment {
    /// Blob endpoint host suffix
    pub fn blob_host_suffix(self) -> &'static str {
        match self {
            Self::AzurePublicCloud => "blob.core.windows.net",
            Self::AzureChina => "blob.core.chinacloudapi.cn",
            Self::AzureGermany => "blob.core.cloudapi.de",
            Self::AzureGovernment => "blob.core.usgovcloudapi.net",
        }
    }
}

/// Raw `build-cache.json` document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildCacheJson {
    pub cache_provider: CacheProviderKind,

    #[serde(default)]
    pub project_output_folder_names: Option<Vec<String>>,

    #[serde(default)]
    pub filesystem_configuration: Option<FilesystemCacheOptions>,

    #[serde(default)]
    pub azure_blob_storage_configuration: Option<AzureBlobStorageOptions>,
}

/// Options for the filesystem provider
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilesystemCacheOptions {
    /// Cache folder, relative to the repository root
    #[serde(default)]
    pub cache_folder: Option<PathBuf>,

    #[serde(default)]
    pub is_cache_write_allowed: bool,
}

/// Options for the Azure blob storage provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AzureBlobStorageOptions {
    pub storage_account_name: String,

    pub storage_container_name: String,

    #[serde(default)]
    pub azure_environment: AzureEnvironment,

    /// Prefix prepended to every blob name
    #[serde(default)]
    pub blob_prefix: Option<String>,

    #[serde(default)]
    pub is_cache_write_allowed: bool,
}

/// Validated provider selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheProviderConfig {
    Filesystem(FilesystemCacheOptions),
    AzureBlobStorage(AzureBlobStorageOptions),
}

impl CacheProviderConfig {
    pub fn kind(&self) -> CacheProviderKind {
        match self {
            Self::Filesystem(_) => CacheProviderKind::Filesystem,
            Self::AzureBlobStorage(_) => CacheProviderKind::AzureBlobStorage,
        }
    }

    pub fn is_cache_write_allowed(&self) -> bool {
        match self {
            Self::Filesystem(options) => options.is_cache_write_allowed,
            Self::AzureBlobStorage(options) => options.is_cache_write_allowed,
        }
    }
}

/// Validated build cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCacheConfig {
    pub provider: CacheProviderConfig,
    /// Output folders archived for every project unless overridden
    pub project_output_folder_names: Vec<String>,
}

impl Default for BuildCacheConfig {
    fn default() -> Self {
        Self {
            provider: CacheProviderConfig::Filesystem(FilesystemCacheOptions::default()),
            project_output_folder_names: default_output_folders(),
        }
    }
}

fn default_output_folders() -> Vec<String> {
    defaults::DEFAULT_OUTPUT_FOLDERS
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl BuildCacheConfig {
    /// Parse and validate `build-cache.json` content
    pub fn from_json(content: &str) -> Result<Self, ConfigurationError> {
        let raw: BuildCacheJson =
            serde_json::from_str(content).map_err(|e| ConfigurationError::Parse {
                path: PathBuf::from(defaults::CACHE_CONFIG_FILE),
                error: e.to_string(),
            })?;
        Self::validate(raw)
    }

    /// Reject blocks for the non-selected provider
    pub fn validate(raw: BuildCacheJson) -> Result<Self, ConfigurationError> {
        let path = defaults::CACHE_CONFIG_FILE.to_string();

        let provider = match raw.cache_provider {
            CacheProviderKind::Filesystem => {
                if raw.azure_blob_storage_configuration.is_some() {
                    return Err(ConfigurationError::ConflictingKeys {
                        path,
                        message: "azureBlobStorageConfiguration is not valid when cacheProvider is 'filesystem'".to_string(),
                    });
                }
                let options = raw.filesystem_configuration.unwrap_or_default();
                if let Some(folder) = &options.cache_folder {
                    validate_cache_folder(folder, &path)?;
                }
                CacheProviderConfig::Filesystem(options)
            }
            CacheProviderKind::AzureBlobStorage => {
                if raw.filesystem_configuration.is_some() {
                    return Err(ConfigurationError::ConflictingKeys {
                        path,
                        message: "filesystemConfiguration is not valid when cacheProvider is 'azure-blob-storage'".to_string(),
                    });
                }
                let options = raw.azure_blob_storage_configuration.ok_or_else(|| {
                    ConfigurationError::MissingField {
                        path: path.clone(),
                        field: "azureBlobStorageConfiguration".to_string(),
                    }
                })?;
                if options.storage_account_name.is_empty() {
                    return Err(ConfigurationError::MissingField {
                        path,
                        field: "azureBlobStorageConfiguration.storageAccountName".to_string(),
                    });
                }
                if options.storage_container_name.is_empty() {
                    return Err(ConfigurationError::MissingField {
                        path,
                        field: "azureBlobStorageConfiguration.storageContainerName".to_string(),
                    });
                }
                CacheProviderConfig::AzureBlobStorage(options)
            }
        };

        Ok(Self {
            provider,
            project_output_folder_names: raw
                .project_output_folder_names
                .unwrap_or_else(default_output_folders),
        })
    }
}

/// `cacheFolder` must be a plain relative path below the repository root
fn validate_cache_folder(folder: &Path, path: &str) -> Result<(), ConfigurationError> {
    let invalid = |message: &str| ConfigurationError::InvalidValue {
        path: path.to_string(),
        field: "filesystemConfiguration.cacheFolder".to_string(),
        message: message.to_string(),
    };

    if folder.as_os_str().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if folder.is_absolute() || folder.has_root() {
        return Err(invalid("must be relative to the repository root"));
    }
    if !folder
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(invalid("must not contain '.' or '..' components"));
    }
    Ok(())
}

/// Per-project `config/build-cache.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectCacheSettings {
    /// Extends the repository-wide list
    #[serde(default)]
    pub additional_project_output_folder_names: Option<Vec<String>>,

    /// Replaces the repository-wide list
    #[serde(default)]
    pub project_output_folder_names: Option<Vec<String>>,
}

impl ProjectCacheSettings {
    /// Parse a per-project override; `path` is used in errors
    pub fn from_json(content: &str, path: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(content).map_err(|e| ConfigurationError::Parse {
            path: PathBuf::from(path),
            error: e.to_string(),
        })
    }
}

/// Output folders for one project
///
/// The two override keys are mutually exclusive.
pub fn resolve_output_folders(
    global: &[String],
    project: Option<&ProjectCacheSettings>,
    path: &str,
) -> Result<Vec<String>, ConfigurationError> {
    let Some(settings) = project else {
        return Ok(global.to_vec());
    };

    match (
        &settings.additional_project_output_folder_names,
        &settings.project_output_folder_names,
    ) {
        (Some(_), Some(_)) => Err(ConfigurationError::ConflictingKeys {
            path: path.to_string(),
            message: "additionalProjectOutputFolderNames and projectOutputFolderNames are mutually exclusive".to_string(),
        }),
        (Some(additional), None) => {
            let mut folders = global.to_vec();
            for folder in additional {
                if !folders.contains(folder) {
                    folders.push(folder.clone());
                }
            }
            Ok(folders)
        }
        (None, Some(replacement)) => Ok(replacement.clone()),
        (None, None) => Ok(global.to_vec()),
    }
}
