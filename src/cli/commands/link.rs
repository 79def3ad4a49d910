//! CLI command for `monobuild link`
//!
//! Validates the workspace and writes the link map without building.

use anyhow::{Context, Result};

use crate::cli::output::status;
use crate::cli::OutputMode;
use crate::core::link_map::LinkMap;
use crate::infra::dirs::RepoContext;
use crate::infra::loader::load_workspace;

/// Execute the link command
pub fn execute(ctx: &RepoContext, mode: OutputMode) -> Result<()> {
    let workspace = load_workspace(ctx).context("Failed to load workspace")?;
    let map = LinkMap::from_graph(&workspace.graph);
    let path = ctx.link_map_path();

    map.save(&path).context("Failed to write link map")?;

    if mode.json {
        println!("{}", map.to_json());
    } else if !mode.quiet {
        println!(
            "{} Linked {} projects ({})",
            status::SUCCESS,
            map.projects.len(),
            path.display()
        );
    }
    Ok(())
}
