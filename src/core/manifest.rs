//! Repository manifest (monobuild.toml) parsing and validation
//!
//! The manifest lists every project of the monorepo. Each project's own
//! dependency list lives in its `package.json` and is merged in by the
//! loader, see [`crate::infra::loader`].
//!
//! Example:
//!
//! ```toml
//! minimumToolVersion = ">=0.1.0"
//!
//! [build]
//! command = "npm run build"
//! parallelism = 4
//!
//! [[projects]]
//! packageName = "@acme/core"
//! projectFolder = "libs/core"
//! reviewCategory = "libraries"
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::config::defaults;
use crate::core::project::ProjectDescriptor;
use crate::core::version;
use crate::error::{ConfigurationError, MonobuildError};

/// npm package name, optionally scoped
const PACKAGE_NAME_PATTERN: &str = r"^(@[a-z0-9][a-z0-9._~-]*/)?[a-z0-9~][a-z0-9._~-]*$";

fn package_name_regex() -> Result<&'static Regex, &'static regex::Error> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PACKAGE_NAME_PATTERN)).as_ref()
}

/// Check that `name` is a valid npm package name
pub fn validate_package_name(name: &str, field: &str) -> Result<(), ConfigurationError> {
    let invalid = || ConfigurationError::InvalidPackageName {
        name: name.to_string(),
        field: field.to_string(),
    };

    let pattern = package_name_regex().map_err(|e| {
        tracing::error!("Package name pattern failed to compile: {e}");
        invalid()
    })?;
    if name.len() <= 214 && pattern.is_match(name) {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// The repository manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepoManifest {
    /// Oldest tool version able to read this manifest
    #[serde(default)]
    pub minimum_tool_version: Option<String>,

    /// Build settings
    #[serde(default)]
    pub build: BuildSettings,

    /// Project entries in declaration order
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
}

/// Build settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildSettings {
    /// Shell command run inside each project folder
    #[serde(default = "default_command")]
    pub command: String,

    /// Number of parallel builds
    #[serde(default)]
    pub parallelism: Option<usize>,

    /// Grace period for in-flight builds after cancellation
    #[serde(default = "default_cancel_timeout")]
    pub cancel_timeout_secs: u64,
}

fn default_command() -> String {
    defaults::DEFAULT_BUILD_COMMAND.to_string()
}

fn default_cancel_timeout() -> u64 {
    defaults::DEFAULT_CANCEL_TIMEOUT_SECS
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            parallelism: None,
            cancel_timeout_secs: default_cancel_timeout(),
        }
    }
}

/// One `[[projects]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectEntry {
    pub package_name: String,

    /// Folder relative to the repository root
    pub project_folder: PathBuf,

    #[serde(default)]
    pub review_category: Option<String>,

    /// Dependencies allowed to form a cycle with this project
    #[serde(default)]
    pub cyclic_dependency_projects: Vec<String>,
}

/// Dependency sections of a project's `package.json`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageJson {
    /// Parse from JSON content
    pub fn from_json(content: &str, path: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(content).map_err(|e| ConfigurationError::Parse {
            path: PathBuf::from(path),
            error: e.to_string(),
        })
    }

    /// Every declared dependency name
    pub fn dependency_names(&self) -> BTreeSet<String> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .cloned()
            .collect()
    }
}

impl RepoManifest {
    /// Parse a manifest from TOML content
    ///
    /// `minimumToolVersion` is checked before the typed parse.
    pub fn from_toml(content: &str) -> Result<Self, MonobuildError> {
        let raw: toml::Value = toml::from_str(content).map_err(|e| parse_error(&e))?;

        if let Some(constraint) = raw.get("minimumToolVersion").and_then(toml::Value::as_str) {
            version::check_tool_version(constraint, defaults::MANIFEST_FILE)?;
        }

        let manifest: Self = raw.try_into().map_err(|e| parse_error(&e))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Semantic checks the structural parse cannot express
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut folders = HashSet::new();
        for (index, entry) in self.projects.iter().enumerate() {
            validate_package_name(&entry.package_name, &format!("projects[{index}].packageName"))?;
            for (i, cyclic) in entry.cyclic_dependency_projects.iter().enumerate() {
                validate_package_name(
                    cyclic,
                    &format!("projects[{index}].cyclicDependencyProjects[{i}]"),
                )?;
            }
            if entry.project_folder.is_absolute() {
                return Err(ConfigurationError::ConflictingKeys {
                    path: defaults::MANIFEST_FILE.to_string(),
                    message: format!(
                        "projects[{index}].projectFolder must be relative to the repository root"
                    ),
                });
            }
            if !folders.insert(entry.project_folder.clone()) {
                return Err(ConfigurationError::ConflictingKeys {
                    path: defaults::MANIFEST_FILE.to_string(),
                    message: format!(
                        "projectFolder '{}' is used by more than one project",
                        entry.project_folder.display()
                    ),
                });
            }
        }

        if self.build.parallelism == Some(0) {
            return Err(ConfigurationError::ConflictingKeys {
                path: defaults::MANIFEST_FILE.to_string(),
                message: "build.parallelism must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Combine a manifest entry with its package manifest
    pub fn descriptor(entry: &ProjectEntry, package: &PackageJson) -> ProjectDescriptor {
        ProjectDescriptor {
            package_name: entry.package_name.clone(),
            project_folder: entry.project_folder.clone(),
            review_category: entry.review_category.clone(),
            cyclic_dependency_projects: entry.cyclic_dependency_projects.iter().cloned().collect(),
            declared_dependencies: package.dependency_names(),
        }
    }
}

fn parse_error(e: &toml::de::Error) -> ConfigurationError {
    ConfigurationError::Parse {
        path: PathBuf::from(defaults::MANIFEST_FILE),
        error: e.to_string(),
    }
}
