//! Project graph construction
//!
//! Builds the [`ProjectGraph`] from typed project descriptors: assigns temp
//! build ids, validates the cyclic-dependency whitelist, derives scheduling
//! edges and downstream lists in one finalization pass, and rejects cycles
//! that the whitelist does not cover.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::core::project::{Project, ProjectDescriptor};
use crate::core::temp_name;
use crate::error::ConfigurationError;

/// DFS marking for cycle detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// The full set of projects plus lookup indices
#[derive(Debug, Clone)]
pub struct ProjectGraph {
    /// Repository root
    root: PathBuf,
    /// Projects in manifest declaration order
    projects: Vec<Project>,
    /// Package name -> index into `projects`
    by_name: HashMap<String, usize>,
}

impl ProjectGraph {
    /// Build and validate a project graph
    ///
    /// Fails on duplicate package names, unknown `cyclicDependencyProjects`
    /// entries, or a dependency cycle not covered by the whitelist.
    pub fn build(
        root: impl Into<PathBuf>,
        descriptors: &[ProjectDescriptor],
    ) -> Result<Self, ConfigurationError> {
        let mut by_name = HashMap::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            if by_name
                .insert(descriptor.package_name.clone(), index)
                .is_some()
            {
                return Err(ConfigurationError::DuplicatePackage {
                    name: descriptor.package_name.clone(),
                });
            }
        }

        let names: Vec<&str> = descriptors
            .iter()
            .map(|d| d.package_name.as_str())
            .collect();
        let mut temp_ids = temp_name::assign(&names);

        let mut projects: Vec<Project> = descriptors
            .iter()
            .map(|d| {
                let id = temp_ids.remove(&d.package_name).unwrap_or_default();
                Project::from_descriptor(d, id)
            })
            .collect();

        for project in &projects {
            for entry in project.cyclic_dependency_projects() {
                if !by_name.contains_key(entry) {
                    return Err(ConfigurationError::UnknownCyclicDependency {
                        project: project.package_name().to_string(),
                        entry: entry.clone(),
                    });
                }
            }
        }

        finalize_edges(&mut projects, &by_name);

        let graph = Self {
            root: root.into(),
            projects,
            by_name,
        };
        graph.check_cycles()?;

        tracing::debug!("Built project graph with {} projects", graph.len());
        Ok(graph)
    }

    /// Repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Projects in declaration order
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Look up a project by package name
    pub fn get(&self, name: &str) -> Option<&Project> {
        self.by_name.get(name).map(|&i| &self.projects[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Scheduling dependencies of a project (empty if unknown)
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.get(name)
            .map(Project::dependency_projects)
            .unwrap_or_default()
    }

    /// Direct downstream dependents of a project (empty if unknown)
    pub fn downstream_of(&self, name: &str) -> &[String] {
        self.get(name)
            .map(Project::downstream_dependency_projects)
            .unwrap_or_default()
    }

    /// Every project that depends on `name`, directly or transitively
    ///
    /// Breadth-first, so nearer dependents come first.
    pub fn transitive_downstream_of(&self, name: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([name]);
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            for dependent in self.downstream_of(current) {
                if seen.insert(dependent.as_str()) {
                    result.push(dependent.clone());
                    queue.push_back(dependent);
                }
            }
        }

        result
    }

    /// Group projects into batches that can build together
    ///
    /// Every project lands in the first batch after all of its dependencies.
    /// Within a batch projects keep declaration order.
    pub fn topological_batches(&self) -> Vec<Vec<String>> {
        let mut remaining: Vec<usize> = self
            .projects
            .iter()
            .map(|p| p.dependency_projects().len())
            .collect();
        let mut current: Vec<usize> = (0..self.projects.len())
            .filter(|&i| remaining[i] == 0)
            .collect();
        let mut batches = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for &index in &current {
                for dependent in self.projects[index].downstream_dependency_projects() {
                    let d = self.by_name[dependent];
                    remaining[d] -= 1;
                    if remaining[d] == 0 {
                        next.push(d);
                    }
                }
            }
            next.sort_unstable();
            batches.push(
                current
                    .iter()
                    .map(|&i| self.projects[i].package_name().to_string())
                    .collect(),
            );
            current = next;
        }

        batches
    }

    /// Three-color DFS over the scheduling edges
    fn check_cycles(&self) -> Result<(), ConfigurationError> {
        let mut marks = vec![Mark::Unvisited; self.projects.len()];
        let mut path = Vec::new();

        for index in 0..self.projects.len() {
            if marks[index] == Mark::Unvisited {
                self.visit(index, &mut marks, &mut path)?;
            }
        }

        Ok(())
    }

    fn visit(
        &self,
        index: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<(), ConfigurationError> {
        match marks[index] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                // The cycle is the path suffix starting at the revisited node
                let start = path.iter().position(|&i| i == index).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|&i| self.projects[i].package_name().to_string())
                    .collect();
                cycle.push(self.projects[index].package_name().to_string());
                return Err(ConfigurationError::DependencyCycle { cycle });
            }
            Mark::Unvisited => {}
        }

        marks[index] = Mark::InProgress;
        path.push(index);

        for dep in self.projects[index].dependency_projects() {
            self.visit(self.by_name[dep], marks, path)?;
        }

        path.pop();
        marks[index] = Mark::Done;
        Ok(())
    }
}

/// Derive scheduling edges and downstream lists
///
/// Reads the immutable declared dependencies of every project and writes the
/// derived fields exactly once.
fn finalize_edges(projects: &mut [Project], by_name: &HashMap<String, usize>) {
    let mut dependencies: Vec<Vec<String>> = vec![Vec::new(); projects.len()];
    let mut downstream: Vec<Vec<String>> = vec![Vec::new(); projects.len()];

    for (index, project) in projects.iter().enumerate() {
        for dep in project.declared_dependencies() {
            if project.allows_cycle_with(dep) {
                continue;
            }
            if let Some(&dep_index) = by_name.get(dep) {
                dependencies[index].push(dep.clone());
                downstream[dep_index].push(project.package_name().to_string());
            }
        }
    }

    for ((project, deps), down) in projects.iter_mut().zip(dependencies).zip(downstream) {
        project.set_dependency_projects(deps);
        project.set_downstream_dependency_projects(down);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Vec<ProjectDescriptor> {
        vec![
            ProjectDescriptor::new("core", "libs/core"),
            ProjectDescriptor::new("utils", "libs/utils").with_dependencies(["core"]),
            ProjectDescriptor::new("app", "apps/app").with_dependencies(["core", "utils"]),
        ]
    }

    #[test]
    fn test_scenario_batches_and_downstream() {
        let graph = ProjectGraph::build("/repo", &scenario()).unwrap();

        assert_eq!(
            graph.topological_batches(),
            vec![
                vec!["core".to_string()],
                vec!["utils".to_string()],
                vec!["app".to_string()],
            ]
        );
        assert_eq!(graph.downstream_of("core"), ["utils", "app"]);
        assert_eq!(graph.downstream_of("utils"), ["app"]);
        assert!(graph.downstream_of("app").is_empty());
    }

    #[test]
    fn test_external_dependencies_are_ignored() {
        let descriptors = vec![
            ProjectDescriptor::new("core", "core").with_dependencies(["lodash", "react"]),
        ];
        let graph = ProjectGraph::build("/repo", &descriptors).unwrap();

        assert!(graph.dependencies_of("core").is_empty());
        assert_eq!(graph.topological_batches(), vec![vec!["core".to_string()]]);
    }

    #[test]
    fn test_duplicate_package_rejected() {
        let descriptors = vec![
            ProjectDescriptor::new("core", "a"),
            ProjectDescriptor::new("core", "b"),
        ];
        let err = ProjectGraph::build("/repo", &descriptors).unwrap_err();

        assert_eq!(
            err,
            ConfigurationError::DuplicatePackage {
                name: "core".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_cyclic_entry_rejected() {
        let descriptors = vec![
            ProjectDescriptor::new("core", "core").with_cyclic_dependencies(["ghost"]),
        ];
        let err = ProjectGraph::build("/repo", &descriptors).unwrap_err();

        assert!(matches!(
            err,
            ConfigurationError::UnknownCyclicDependency { ref entry, .. } if entry == "ghost"
        ));
    }

    #[test]
    fn test_cycle_detected_with_members() {
        let descriptors = vec![
            ProjectDescriptor::new("a", "a").with_dependencies(["b"]),
            ProjectDescriptor::new("b", "b").with_dependencies(["c"]),
            ProjectDescriptor::new("c", "c").with_dependencies(["a"]),
        ];
        let err = ProjectGraph::build("/repo", &descriptors).unwrap_err();

        match err {
            ConfigurationError::DependencyCycle { cycle } => {
                assert_eq!(cycle, ["a", "b", "c", "a"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_whitelisted_cycle_accepted() {
        let descriptors = vec![
            ProjectDescriptor::new("a", "a")
                .with_dependencies(["b"])
                .with_cyclic_dependencies(["b"]),
            ProjectDescriptor::new("b", "b")
                .with_dependencies(["a"])
                .with_cyclic_dependencies(["a"]),
        ];
        let graph = ProjectGraph::build("/repo", &descriptors).unwrap();

        assert!(graph.dependencies_of("a").is_empty());
        assert!(graph.downstream_of("a").is_empty());
        assert_eq!(graph.topological_batches().len(), 1);
    }

    #[test]
    fn test_partially_whitelisted_cycle_accepted() {
        let descriptors = vec![
            ProjectDescriptor::new("a", "a").with_dependencies(["b"]),
            ProjectDescriptor::new("b", "b")
                .with_dependencies(["a"])
                .with_cyclic_dependencies(["a"]),
        ];
        let graph = ProjectGraph::build("/repo", &descriptors).unwrap();

        assert_eq!(graph.dependencies_of("a"), ["b"]);
        assert_eq!(graph.downstream_of("b"), ["a"]);
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let descriptors = vec![ProjectDescriptor::new("a", "a").with_dependencies(["a"])];

        assert!(matches!(
            ProjectGraph::build("/repo", &descriptors),
            Err(ConfigurationError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn test_transitive_downstream() {
        let graph = ProjectGraph::build("/repo", &scenario()).unwrap();

        assert_eq!(graph.transitive_downstream_of("core"), ["utils", "app"]);
        assert_eq!(graph.transitive_downstream_of("utils"), ["app"]);
        assert!(graph.transitive_downstream_of("app").is_empty());
    }

    #[test]
    fn test_temp_build_ids_assigned() {
        let descriptors = vec![
            ProjectDescriptor::new("@b/core", "b"),
            ProjectDescriptor::new("@a/core", "a"),
        ];
        let graph = ProjectGraph::build("/repo", &descriptors).unwrap();

        assert_eq!(graph.get("@a/core").unwrap().temp_build_id(), "core");
        assert_eq!(graph.get("@b/core").unwrap().temp_build_id(), "core_2");
    }
}
