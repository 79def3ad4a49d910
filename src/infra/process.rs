//! Shell build step
//!
//! Runs the repository's build command inside each project folder and keeps
//! the combined output in a per-project log file under `common/temp/logs`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::core::builder::BuildStep;
use crate::core::project::Project;
use crate::error::BuildError;
use crate::infra::filesystem;

/// Environment variables exported to the build command
pub const ENV_PROJECT: &str = "MONOBUILD_PROJECT";
pub const ENV_TEMP_BUILD_ID: &str = "MONOBUILD_TEMP_BUILD_ID";

/// Lines of stderr kept in the failure message
const STDERR_TAIL_LINES: usize = 20;

/// Runs a shell command per project
#[derive(Debug, Clone)]
pub struct ShellBuildStep {
    command: String,
    logs_dir: PathBuf,
}

impl ShellBuildStep {
    pub fn new(command: &str, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.to_string(),
            logs_dir: logs_dir.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Log file of a project
    pub fn log_path(&self, project: &Project) -> PathBuf {
        self.logs_dir.join(format!("{}.log", project.temp_build_id()))
    }

    fn shell(&self) -> Command {
        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C");
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c");
            c
        };
        command.arg(&self.command);
        command
    }
}

fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[async_trait]
impl BuildStep for ShellBuildStep {
    async fn run(&self, project: &Project, project_dir: &Path) -> Result<(), BuildError> {
        let name = project.package_name();
        let failed = |error: String| BuildError::BuildFailed {
            project: name.to_string(),
            error,
        };

        tracing::debug!("Running '{}' in {}", self.command, project_dir.display());
        let output = self
            .shell()
            .current_dir(project_dir)
            .env(ENV_PROJECT, name)
            .env(ENV_TEMP_BUILD_ID, project.temp_build_id())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| failed(format!("failed to start '{}': {e}", self.command)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let log_path = self.log_path(project);
        let log = format!("$ {}\n{stdout}{stderr}", self.command);
        if let Err(e) = filesystem::write_file_atomic(&log_path, &log) {
            tracing::warn!("Could not write build log for {name}: {e}");
        }

        if output.status.success() {
            return Ok(());
        }

        let code = output
            .status
            .code()
            .map_or_else(|| "a signal".to_string(), |c| format!("exit code {c}"));
        let mut message = format!("'{}' terminated with {code}", self.command);
        let tail = tail(&stderr, STDERR_TAIL_LINES);
        if !tail.is_empty() {
            message.push('\n');
            message.push_str(&tail);
        }
        message.push_str(&format!("\nFull log: {}", log_path.display()));
        Err(failed(message))
    }
}
