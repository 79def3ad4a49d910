//! Project entity model
//!
//! A [`Project`] is one buildable package of the monorepo. Projects are
//! created from [`ProjectDescriptor`]s by the graph builder and never change
//! after the graph is finalized.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Validated, typed description of one manifest entry
///
/// Produced by the loader from `monobuild.toml` and the project's own
/// `package.json`. The core only ever sees this structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    /// Package name, unique across the repository
    pub package_name: String,
    /// Folder relative to the repository root
    pub project_folder: PathBuf,
    /// Optional review classifier
    pub review_category: Option<String>,
    /// Dependencies allowed to form a cycle with this project
    pub cyclic_dependency_projects: BTreeSet<String>,
    /// Every dependency name from the project's package manifest
    pub declared_dependencies: BTreeSet<String>,
}

impl ProjectDescriptor {
    /// Create a descriptor with no dependencies
    pub fn new(package_name: &str, project_folder: impl Into<PathBuf>) -> Self {
        Self {
            package_name: package_name.to_string(),
            project_folder: project_folder.into(),
            review_category: None,
            cyclic_dependency_projects: BTreeSet::new(),
            declared_dependencies: BTreeSet::new(),
        }
    }

    /// Add declared dependencies
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_dependencies
            .extend(deps.into_iter().map(Into::into));
        self
    }

    /// Add cyclic dependency whitelist entries
    #[must_use]
    pub fn with_cyclic_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cyclic_dependency_projects
            .extend(deps.into_iter().map(Into::into));
        self
    }

    /// Set the review category
    #[must_use]
    pub fn with_review_category(mut self, category: &str) -> Self {
        self.review_category = Some(category.to_string());
        self
    }
}

/// One monorepo package inside a [`crate::core::graph::ProjectGraph`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    package_name: String,
    project_folder: PathBuf,
    review_category: Option<String>,
    declared_dependencies: BTreeSet<String>,
    cyclic_dependency_projects: BTreeSet<String>,
    temp_build_id: String,
    dependency_projects: Vec<String>,
    downstream_dependency_projects: Vec<String>,
}

impl Project {
    pub(crate) fn from_descriptor(descriptor: &ProjectDescriptor, temp_build_id: String) -> Self {
        Self {
            package_name: descriptor.package_name.clone(),
            project_folder: descriptor.project_folder.clone(),
            review_category: descriptor.review_category.clone(),
            declared_dependencies: descriptor.declared_dependencies.clone(),
            cyclic_dependency_projects: descriptor.cyclic_dependency_projects.clone(),
            temp_build_id,
            dependency_projects: Vec::new(),
            downstream_dependency_projects: Vec::new(),
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Folder relative to the repository root
    pub fn project_folder(&self) -> &Path {
        &self.project_folder
    }

    /// Absolute project folder under `root`
    pub fn absolute_folder(&self, root: &Path) -> PathBuf {
        root.join(&self.project_folder)
    }

    pub fn review_category(&self) -> Option<&str> {
        self.review_category.as_deref()
    }

    /// All dependency names from the package manifest, in-repo or not
    pub fn declared_dependencies(&self) -> &BTreeSet<String> {
        &self.declared_dependencies
    }

    pub fn cyclic_dependency_projects(&self) -> &BTreeSet<String> {
        &self.cyclic_dependency_projects
    }

    /// Stable, collision-free identifier for isolated builds
    pub fn temp_build_id(&self) -> &str {
        &self.temp_build_id
    }

    /// In-repo dependencies that take part in scheduling
    ///
    /// Excludes dependencies whitelisted in `cyclicDependencyProjects`.
    pub fn dependency_projects(&self) -> &[String] {
        &self.dependency_projects
    }

    /// Projects that depend directly on this one, in discovery order
    pub fn downstream_dependency_projects(&self) -> &[String] {
        &self.downstream_dependency_projects
    }

    /// Whether the edge to `dependency` is whitelisted as cyclic
    pub fn allows_cycle_with(&self, dependency: &str) -> bool {
        self.cyclic_dependency_projects.contains(dependency)
    }

    pub(crate) fn set_dependency_projects(&mut self, deps: Vec<String>) {
        self.dependency_projects = deps;
    }

    pub(crate) fn set_downstream_dependency_projects(&mut self, downstream: Vec<String>) {
        self.downstream_dependency_projects = downstream;
    }
}
