//! Build command implementation
//!
//! Implements `monobuild build`: loads the workspace, writes the link map,
//! then builds every project through the configured cache provider.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::output::{self, create_build_bar};
use crate::cli::OutputMode;
use crate::core::builder::BuildOrchestrator;
use crate::core::link_map::LinkMap;
use crate::infra::cache::create_provider;
use crate::infra::dirs::RepoContext;
use crate::infra::loader::load_workspace;
use crate::infra::process::ShellBuildStep;

/// Build options
pub struct BuildOptions {
    /// Overrides `[build].parallelism`
    pub parallelism: Option<usize>,
    /// Skip the cache provider entirely
    pub no_cache: bool,
    pub mode: OutputMode,
}

/// Execute the build command
pub async fn execute(ctx: &RepoContext, options: BuildOptions) -> Result<i32> {
    let workspace = load_workspace(ctx).context("Failed to load workspace")?;
    let settings = &workspace.manifest.build;

    LinkMap::from_graph(&workspace.graph)
        .save(&ctx.link_map_path())
        .context("Failed to write link map")?;

    let step = Arc::new(ShellBuildStep::new(&settings.command, ctx.logs_dir()));
    let total = workspace.graph.len() as u64;
    let graph = Arc::new(workspace.graph);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing running projects");
            on_signal.cancel();
        }
    });

    let mut orchestrator = BuildOrchestrator::new(graph, step)
        .with_output_folders(workspace.output_folders)
        .with_cancellation(cancel)
        .with_cancel_timeout(Duration::from_secs(settings.cancel_timeout_secs));

    if let Some(parallelism) = options.parallelism.or(settings.parallelism) {
        orchestrator = orchestrator.with_parallelism(parallelism);
    }

    if options.no_cache {
        tracing::info!("Build cache disabled");
    } else {
        let provider = create_provider(&workspace.cache.provider, ctx);
        tracing::info!(
            "Using {} cache at {}{}",
            provider.id(),
            provider.location(),
            if provider.is_write_allowed() {
                ""
            } else {
                " (read-only)"
            }
        );
        orchestrator = orchestrator.with_cache(provider);
    }

    let bar = if options.mode.quiet || options.mode.json {
        ProgressBar::hidden()
    } else {
        create_build_bar(total)
    };
    let progress = bar.clone();
    orchestrator = orchestrator.with_progress(Box::new(move |outcome| {
        progress.inc(1);
        progress.set_message(outcome.package_name.clone());
        progress.println(output::outcome_line(outcome));
    }));

    let report = orchestrator.run().await.context("Build session aborted")?;
    bar.finish_and_clear();

    if options.mode.json {
        println!("{}", report.to_json());
    } else if !options.mode.quiet || !report.is_success() {
        println!("{}", output::summary(&report));
    }

    Ok(i32::from(!report.is_success()))
}
