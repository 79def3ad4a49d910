//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Build command used by test repositories
///
/// Fails when the project folder contains a `FAIL` marker, otherwise writes
/// `dist/out.txt` and appends the project name to `<root>/build-log.txt`.
pub const BUILD_COMMAND: &str = "test ! -f FAIL && mkdir -p dist && echo \"built $MONOBUILD_PROJECT\" > dist/out.txt && echo \"$MONOBUILD_PROJECT\" >> \"$MONOBUILD_TEST_ROOT/build-log.txt\"";

/// Filesystem cache with writes enabled
pub const WRITABLE_CACHE: &str =
    r#"{"cacheProvider": "filesystem", "filesystemConfiguration": {"isCacheWriteAllowed": true}}"#;

/// Temporary monorepo
///
/// Projects are added with [`TestRepo::add_project`]; the manifest is
/// rewritten after every change.
pub struct TestRepo {
    /// Temporary directory for the repository
    pub dir: TempDir,
    projects: Vec<(String, String, Vec<String>)>,
    build_command: String,
}

impl TestRepo {
    /// Create an empty repository in a temporary directory
    pub fn new() -> Self {
        let repo = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
            projects: Vec::new(),
            build_command: BUILD_COMMAND.to_string(),
        };
        repo.write_manifest();
        repo
    }

    /// Get the path to the repository root
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Add a project with a package.json and a source file
    pub fn add_project(&mut self, name: &str, folder: &str, deps: &[&str]) -> &mut Self {
        let dependencies: serde_json::Map<String, serde_json::Value> = deps
            .iter()
            .map(|d| ((*d).to_string(), serde_json::Value::from("workspace:*")))
            .collect();
        let package = serde_json::json!({ "name": name, "dependencies": dependencies });
        self.create_file(
            &format!("{folder}/package.json"),
            &serde_json::to_string_pretty(&package).expect("Failed to serialize package.json"),
        );
        self.create_file(&format!("{folder}/src/index.js"), &format!("// {name}\n"));
        self.projects.push((
            name.to_string(),
            folder.to_string(),
            Vec::new(),
        ));
        self.write_manifest();
        self
    }

    /// Whitelist a cyclic dependency of an already added project
    pub fn allow_cycle(&mut self, name: &str, dependency: &str) -> &mut Self {
        if let Some(entry) = self.projects.iter_mut().find(|(n, _, _)| n == name) {
            entry.2.push(dependency.to_string());
        }
        self.write_manifest();
        self
    }

    /// Replace the build command
    pub fn with_build_command(&mut self, command: &str) -> &mut Self {
        self.build_command = command.to_string();
        self.write_manifest();
        self
    }

    /// Write `common/config/build-cache.json`
    pub fn with_cache_config(&mut self, json: &str) -> &mut Self {
        self.create_file("common/config/build-cache.json", json);
        self
    }

    fn write_manifest(&self) {
        let mut manifest = format!(
            "[build]\ncommand = {}\n",
            toml_string(&self.build_command)
        );
        for (name, folder, cyclic) in &self.projects {
            manifest.push_str(&format!(
                "\n[[projects]]\npackageName = {}\nprojectFolder = {}\n",
                toml_string(name),
                toml_string(folder)
            ));
            if !cyclic.is_empty() {
                let list: Vec<String> = cyclic.iter().map(|c| toml_string(c)).collect();
                manifest.push_str(&format!("cyclicDependencyProjects = [{}]\n", list.join(", ")));
            }
        }
        self.create_file("monobuild.toml", &manifest);
    }

    /// Create a file in the repository
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Remove a file from the repository
    pub fn remove_file(&self, name: &str) {
        std::fs::remove_file(self.dir.path().join(name)).expect("Failed to remove file");
    }

    /// Check if a file exists in the repository
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the repository
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Projects built so far, in build order
    pub fn build_log(&self) -> Vec<String> {
        if !self.file_exists("build-log.txt") {
            return Vec::new();
        }
        self.read_file("build-log.txt")
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    /// Forget previous builds
    pub fn clear_build_log(&self) {
        if self.file_exists("build-log.txt") {
            self.remove_file("build-log.txt");
        }
    }

    /// Run monobuild in the repository root
    pub fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_monobuild"));
        cmd.current_dir(self.path());
        cmd.env("MONOBUILD_TEST_ROOT", self.path());
        cmd.env_remove("MONOBUILD_BUILD_CACHE_DIR");
        cmd.env_remove("MONOBUILD_BUILD_CACHE_CREDENTIAL");
        cmd.env_remove("RUST_LOG");
        cmd.args(args);
        cmd.output().expect("Failed to execute monobuild")
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

/// Stdout of a command as text
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Stderr of a command as text
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
