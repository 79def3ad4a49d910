//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod cache;
pub mod graph;
pub mod link;

use anyhow::Result;
use clap::Subcommand;

use super::OutputMode;
use crate::infra::dirs::RepoContext;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build all projects in dependency order
    Build {
        /// Number of projects built at the same time
        #[arg(short, long, env = "MONOBUILD_PARALLELISM")]
        parallelism: Option<usize>,

        /// Neither read from nor write to the build cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Show build batches and temp build ids
    Graph,

    /// Write the link map without building
    Link,

    /// Manage the build cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache provider and location
    Info,

    /// Remove all entries from the local cache
    Clean,
}

impl Commands {
    /// Execute the command, returning the process exit code
    pub async fn run(self, mode: OutputMode) -> Result<i32> {
        let current_dir = std::env::current_dir()?;
        let ctx = RepoContext::discover(&current_dir)?.with_env_overrides();
        tracing::debug!("Repository context: {ctx:?}");

        match self {
            Self::Build {
                parallelism,
                no_cache,
            } => {
                let options = build::BuildOptions {
                    parallelism,
                    no_cache,
                    mode,
                };
                build::execute(&ctx, options).await
            }
            Self::Graph => graph::execute(&ctx, mode).map(|()| 0),
            Self::Link => link::execute(&ctx, mode).map(|()| 0),
            Self::Cache { command } => match command {
                CacheCommands::Info => cache::execute_info(&ctx, mode).map(|()| 0),
                CacheCommands::Clean => cache::execute_clean(&ctx, mode).map(|()| 0),
            },
        }
    }
}
