//! Link map persisted after graph construction
//!
//! Records, per project, the temp build id and the in-repo dependencies it
//! links against. Downstream build tooling reads this file instead of
//! re-resolving the graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::graph::ProjectGraph;
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// One project's entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkEntry {
    pub temp_build_id: String,
    pub project_folder: PathBuf,
    /// In-repo dependencies, sorted
    pub local_dependencies: Vec<String>,
}

/// The link map file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkMap {
    pub projects: BTreeMap<String, LinkEntry>,
}

impl LinkMap {
    /// Snapshot a finalized graph
    pub fn from_graph(graph: &ProjectGraph) -> Self {
        let projects = graph
            .projects()
            .iter()
            .map(|project| {
                let mut deps = project.dependency_projects().to_vec();
                deps.sort();
                (
                    project.package_name().to_string(),
                    LinkEntry {
                        temp_build_id: project.temp_build_id().to_string(),
                        project_folder: project.project_folder().to_path_buf(),
                        local_dependencies: deps,
                    },
                )
            })
            .collect();

        Self { projects }
    }

    pub fn to_json(&self) -> String {
        // BTreeMap and plain structs cannot fail to serialize
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Write the link map
    pub fn save(&self, path: &Path) -> Result<(), FilesystemError> {
        let mut content = self.to_json();
        content.push('\n');
        filesystem::write_file_atomic(path, &content)?;
        tracing::debug!("Wrote link map to {}", path.display());
        Ok(())
    }

    /// Read a previously written link map
    pub fn load(path: &Path) -> Result<Self, FilesystemError> {
        let content = filesystem::read_file(path)?;
        serde_json::from_str(&content).map_err(|e| FilesystemError::ReadFile {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::ProjectDescriptor;
    use tempfile::TempDir;

    fn graph() -> ProjectGraph {
        ProjectGraph::build(
            "/repo",
            &[
                ProjectDescriptor::new("@acme/core", "libs/core"),
                ProjectDescriptor::new("@acme/app", "apps/app")
                    .with_dependencies(["@acme/core", "react"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_entries_from_graph() {
        let map = LinkMap::from_graph(&graph());
        let app = &map.projects["@acme/app"];

        assert_eq!(app.temp_build_id, "app");
        assert_eq!(app.project_folder, PathBuf::from("apps/app"));
        assert_eq!(app.local_dependencies, ["@acme/core"]);
        assert!(map.projects["@acme/core"].local_dependencies.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let json = LinkMap::from_graph(&graph()).to_json();

        assert!(json.contains("\"tempBuildId\": \"core\""));
        assert!(json.contains("\"localDependencies\""));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("common/temp/link-map.json");
        let map = LinkMap::from_graph(&graph());

        map.save(&path).unwrap();

        assert_eq!(LinkMap::load(&path).unwrap(), map);
    }
}
