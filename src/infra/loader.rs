//! Workspace loading
//!
//! Reads `monobuild.toml`, every project's `package.json`, the build cache
//! configuration and per-project cache overrides, and turns them into the
//! typed structures the core works with. All configuration errors surface
//! here, before any build work starts.

use std::collections::HashMap;
use std::path::Path;

use crate::core::cache_config::{resolve_output_folders, BuildCacheConfig, ProjectCacheSettings};
use crate::core::graph::ProjectGraph;
use crate::core::manifest::{PackageJson, RepoManifest};
use crate::error::{ConfigurationError, MonobuildError};
use crate::infra::dirs::RepoContext;

/// Everything needed to start a build session
#[derive(Debug, Clone)]
pub struct Workspace {
    pub manifest: RepoManifest,
    pub graph: ProjectGraph,
    pub cache: BuildCacheConfig,
    /// Resolved output folders per package name
    pub output_folders: HashMap<String, Vec<String>>,
}

fn read_config(path: &Path) -> Result<String, ConfigurationError> {
    std::fs::read_to_string(path).map_err(|e| ConfigurationError::Unreadable {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

fn display_relative(ctx: &RepoContext, path: &Path) -> String {
    path.strip_prefix(ctx.root())
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Load and validate the repository manifest
pub fn load_manifest(ctx: &RepoContext) -> Result<RepoManifest, MonobuildError> {
    let path = ctx.manifest_path();
    if !path.is_file() {
        return Err(MonobuildError::ManifestNotFound {
            path: ctx.root().display().to_string(),
        });
    }
    RepoManifest::from_toml(&read_config(&path)?)
}

/// Load the build cache configuration, or the defaults if absent
pub fn load_cache_config(ctx: &RepoContext) -> Result<BuildCacheConfig, ConfigurationError> {
    let path = ctx.cache_config_path();
    if !path.is_file() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(BuildCacheConfig::default());
    }
    BuildCacheConfig::from_json(&read_config(&path)?)
}

/// Load the whole workspace
pub fn load_workspace(ctx: &RepoContext) -> Result<Workspace, MonobuildError> {
    let manifest = load_manifest(ctx)?;

    let mut descriptors = Vec::with_capacity(manifest.projects.len());
    for entry in &manifest.projects {
        let package_path = ctx
            .root()
            .join(&entry.project_folder)
            .join(crate::config::defaults::PACKAGE_FILE);
        let relative = display_relative(ctx, &package_path);
        let package = PackageJson::from_json(&read_config(&package_path)?, &relative)?;

        if let Some(name) = &package.name {
            if name != &entry.package_name {
                return Err(ConfigurationError::ConflictingKeys {
                    path: relative,
                    message: format!(
                        "package name '{name}' does not match packageName '{}' in monobuild.toml",
                        entry.package_name
                    ),
                }
                .into());
            }
        }

        descriptors.push(RepoManifest::descriptor(entry, &package));
    }

    let graph = ProjectGraph::build(ctx.root(), &descriptors)?;
    let cache = load_cache_config(ctx)?;

    let mut output_folders = HashMap::with_capacity(graph.len());
    for project in graph.projects() {
        let path = ctx.project_cache_config_path(project.project_folder());
        let relative = display_relative(ctx, &path);
        let settings = if path.is_file() {
            Some(ProjectCacheSettings::from_json(&read_config(&path)?, &relative)?)
        } else {
            None
        };
        let folders = resolve_output_folders(
            &cache.project_output_folder_names,
            settings.as_ref(),
            &relative,
        )?;
        output_folders.insert(project.package_name().to_string(), folders);
    }

    tracing::info!(
        "Loaded {} projects from {}",
        graph.len(),
        ctx.manifest_path().display()
    );

    Ok(Workspace {
        manifest,
        graph,
        cache,
        output_folders,
    })
}
