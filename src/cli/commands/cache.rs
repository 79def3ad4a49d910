//! CLI command for `monobuild cache`
//!
//! Shows where the build cache lives and clears the local one.

use anyhow::{bail, Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::cli::output::{format_size, status};
use crate::cli::OutputMode;
use crate::core::cache_config::CacheProviderConfig;
use crate::infra::cache::{create_provider, filesystem_root};
use crate::infra::dirs::RepoContext;
use crate::infra::filesystem;
use crate::infra::loader::load_cache_config;

/// Execute cache info subcommand
pub fn execute_info(ctx: &RepoContext, mode: OutputMode) -> Result<()> {
    let config = load_cache_config(ctx).context("Failed to load build cache configuration")?;
    let provider = create_provider(&config.provider, ctx);
    let (size, entries) = match &config.provider {
        CacheProviderConfig::Filesystem(options) => {
            let (size, count) = filesystem::dir_usage(&filesystem_root(options, ctx));
            (Some(size), Some(count))
        }
        CacheProviderConfig::AzureBlobStorage(_) => (None, None),
    };

    if mode.json {
        let info = json!({
            "provider": provider.id(),
            "location": provider.location(),
            "writeAllowed": provider.is_write_allowed(),
            "outputFolders": config.project_output_folder_names,
            "sizeBytes": size,
            "entries": entries,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Provider: {}", provider.id());
    println!("Location: {}", provider.location());
    println!(
        "Writes: {}",
        if provider.is_write_allowed() {
            "allowed"
        } else {
            "disabled"
        }
    );
    println!(
        "Output folders: {}",
        config.project_output_folder_names.join(", ")
    );
    if let (Some(size), Some(entries)) = (size, entries) {
        println!("Size: {}", format_size(size));
        println!("Entries: {entries}");
    }
    Ok(())
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Refuse to clean a folder that is the repository root or contains it
fn ensure_outside_repository(cache_root: &Path, repo_root: &Path) -> Result<()> {
    let cache_root = canonical(cache_root);
    if canonical(repo_root).starts_with(&cache_root) {
        bail!(
            "Refusing to clean '{}': it contains the repository",
            cache_root.display()
        );
    }
    Ok(())
}

/// Execute cache clean subcommand
pub fn execute_clean(ctx: &RepoContext, mode: OutputMode) -> Result<()> {
    let config = load_cache_config(ctx).context("Failed to load build cache configuration")?;
    let CacheProviderConfig::Filesystem(options) = &config.provider else {
        bail!(
            "cache clean only supports the local filesystem cache, not '{}'",
            config.provider.kind().as_str()
        );
    };

    let root = filesystem_root(options, ctx);
    ensure_outside_repository(&root, ctx.root())?;
    let (size, entries) = filesystem::dir_usage(&root);
    filesystem::remove_dir_all(&root).context("Failed to clean cache")?;
    tracing::info!("Removed {}", root.display());

    if !mode.quiet {
        if entries == 0 {
            println!("{} Cache was already empty", status::SUCCESS);
        } else {
            println!(
                "{} Removed {entries} entries ({} freed)",
                status::SUCCESS,
                format_size(size)
            );
        }
    }
    Ok(())
}
