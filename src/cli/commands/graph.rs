//! CLI command for displaying the project graph
//!
//! Implements the `monobuild graph` command.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::OutputMode;
use crate::core::graph::ProjectGraph;
use crate::infra::dirs::RepoContext;
use crate::infra::loader::load_workspace;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphProject<'a> {
    package_name: &'a str,
    temp_build_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    review_category: Option<&'a str>,
    dependencies: &'a [String],
    downstream: &'a [String],
}

#[derive(Serialize)]
struct GraphJson<'a> {
    projects: Vec<GraphProject<'a>>,
    batches: Vec<Vec<String>>,
}

/// Render the graph as text
pub fn render(graph: &ProjectGraph) -> String {
    let mut out = String::new();
    for (index, batch) in graph.topological_batches().iter().enumerate() {
        out.push_str(&format!("Batch {}:\n", index + 1));
        for name in batch {
            let Some(project) = graph.get(name) else {
                continue;
            };
            out.push_str(&format!("  {name} [{}]", project.temp_build_id()));
            if !project.dependency_projects().is_empty() {
                out.push_str(&format!(" <- {}", project.dependency_projects().join(", ")));
            }
            out.push('\n');
        }
    }
    out
}

/// Render the graph as JSON
pub fn render_json(graph: &ProjectGraph) -> Result<String> {
    let json = GraphJson {
        projects: graph
            .projects()
            .iter()
            .map(|p| GraphProject {
                package_name: p.package_name(),
                temp_build_id: p.temp_build_id(),
                review_category: p.review_category(),
                dependencies: p.dependency_projects(),
                downstream: p.downstream_dependency_projects(),
            })
            .collect(),
        batches: graph.topological_batches(),
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

/// Execute the graph command
pub fn execute(ctx: &RepoContext, mode: OutputMode) -> Result<()> {
    let workspace = load_workspace(ctx).context("Failed to load workspace")?;

    if mode.json {
        println!("{}", render_json(&workspace.graph)?);
    } else {
        print!("{}", render(&workspace.graph));
    }
    Ok(())
}
