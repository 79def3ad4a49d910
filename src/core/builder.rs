//! Build orchestration
//!
//! Runs the build step of every project in dependency order with bounded
//! parallelism. A single coordinator loop owns all session state; workers
//! only compute a key, consult the cache and run the build step, then hand
//! an outcome back. A project is dispatched only once every scheduling
//! dependency has finished as `Skipped` or `Succeeded`; when a project fails
//! everything downstream of it is marked failed without running.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::defaults;
use crate::core::cache_key::{CacheKey, CacheKeyComputer};
use crate::core::graph::ProjectGraph;
use crate::core::project::Project;
use crate::core::report::{BuildReport, ProjectOutcome, ProjectStatus};
use crate::error::{BuildError, CacheError, CacheKeyError};
use crate::infra::archive;
use crate::infra::cache::CacheProvider;

/// The per-project build command
#[async_trait]
pub trait BuildStep: Send + Sync {
    /// Build `project`, whose folder is `project_dir`
    async fn run(&self, project: &Project, project_dir: &Path) -> Result<(), BuildError>;
}

/// Called on the coordinator for every terminal outcome
pub type ProgressCallback = Box<dyn Fn(&ProjectOutcome) + Send + Sync>;

/// Coordinator view of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProjectState {
    Pending,
    Running,
    Finished,
}

/// Builds a [`ProjectGraph`]
pub struct BuildOrchestrator {
    graph: Arc<ProjectGraph>,
    step: Arc<dyn BuildStep>,
    cache: Option<Arc<dyn CacheProvider>>,
    parallelism: usize,
    output_folders: HashMap<String, Vec<String>>,
    cancel: CancellationToken,
    cancel_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl BuildOrchestrator {
    /// Create an orchestrator without a cache
    pub fn new(graph: Arc<ProjectGraph>, step: Arc<dyn BuildStep>) -> Self {
        Self {
            graph,
            step,
            cache: None,
            parallelism: num_cpus::get().max(1),
            output_folders: HashMap::new(),
            cancel: CancellationToken::new(),
            cancel_timeout: Duration::from_secs(defaults::DEFAULT_CANCEL_TIMEOUT_SECS),
            progress: None,
        }
    }

    /// Consult and populate `provider`
    #[must_use]
    pub fn with_cache(mut self, provider: Arc<dyn CacheProvider>) -> Self {
        self.cache = Some(provider);
        self
    }

    /// Maximum number of concurrently running projects (at least 1)
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Output folders per package name; unlisted projects use the defaults
    #[must_use]
    pub fn with_output_folders(mut self, folders: HashMap<String, Vec<String>>) -> Self {
        self.output_folders = folders;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// How long running projects may take to finish after cancellation
    #[must_use]
    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    fn notify(&self, outcome: &ProjectOutcome) {
        if let Some(progress) = &self.progress {
            progress(outcome);
        }
    }

    /// Run one build session
    ///
    /// Project failures are reported in the returned [`BuildReport`]. An
    /// `Err` means the scheduler itself broke an invariant.
    pub async fn run(&self) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let graph = &self.graph;

        let worker = Arc::new(Worker {
            graph: Arc::clone(graph),
            step: Arc::clone(&self.step),
            keys: self
                .cache
                .as_ref()
                .map(|cache| CacheKeyComputer::new(cache.id())),
            cache: self.cache.clone(),
            output_folders: self.output_folders.clone(),
            default_output_folders: defaults::DEFAULT_OUTPUT_FOLDERS
                .iter()
                .map(ToString::to_string)
                .collect(),
        });

        let mut states: HashMap<&str, ProjectState> = HashMap::with_capacity(graph.len());
        let mut remaining: HashMap<&str, usize> = HashMap::with_capacity(graph.len());
        let mut ready: VecDeque<String> = VecDeque::new();
        for project in graph.projects() {
            let name = project.package_name();
            states.insert(name, ProjectState::Pending);
            remaining.insert(name, project.dependency_projects().len());
            if project.dependency_projects().is_empty() {
                ready.push_back(name.to_string());
            }
        }

        let mut outcomes: HashMap<String, ProjectOutcome> = HashMap::with_capacity(graph.len());
        let mut in_flight: JoinSet<(String, Result<ProjectOutcome, BuildError>)> = JoinSet::new();
        let mut deadline: Option<tokio::time::Instant> = None;

        tracing::info!(
            "Building {} projects with parallelism {}",
            graph.len(),
            self.parallelism
        );

        loop {
            if deadline.is_none() && !self.cancel.is_cancelled() {
                while in_flight.len() < self.parallelism {
                    let Some(name) = ready.pop_front() else {
                        break;
                    };
                    if let Some(state) = states.get_mut(name.as_str()) {
                        *state = ProjectState::Running;
                    }
                    tracing::debug!("Dispatching {name}");
                    let worker = Arc::clone(&worker);
                    in_flight.spawn(async move {
                        let result = worker.build(&name).await;
                        (name, result)
                    });
                }
            }

            if in_flight.is_empty() {
                break;
            }

            let joined = tokio::select! {
                joined = in_flight.join_next() => joined,
                () = self.cancel.cancelled(), if deadline.is_none() => {
                    tracing::warn!(
                        "Build cancelled, waiting up to {:?} for {} running projects",
                        self.cancel_timeout,
                        in_flight.len()
                    );
                    deadline = Some(tokio::time::Instant::now() + self.cancel_timeout);
                    continue;
                }
                () = tokio::time::sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now)),
                    if deadline.is_some() =>
                {
                    tracing::warn!("Aborting {} running projects", in_flight.len());
                    in_flight.abort_all();
                    while in_flight.join_next().await.is_some() {}
                    break;
                }
            };

            let Some(joined) = joined else {
                break;
            };
            let (name, result) =
                joined.map_err(|e| BuildError::Internal(format!("build task failed: {e}")))?;
            let outcome = result?;

            if let Some(state) = states.get_mut(name.as_str()) {
                *state = ProjectState::Finished;
            }
            self.notify(&outcome);

            if outcome.status == ProjectStatus::Failed {
                for dependent in graph.transitive_downstream_of(&name) {
                    let Some(state) = states.get_mut(dependent.as_str()) else {
                        continue;
                    };
                    if *state != ProjectState::Pending {
                        continue;
                    }
                    *state = ProjectState::Finished;
                    tracing::warn!("Skipping {dependent}: dependency {name} failed");
                    let blocked = ProjectOutcome::blocked(&dependent, &name);
                    self.notify(&blocked);
                    outcomes.insert(dependent, blocked);
                }
            } else {
                for dependent in graph.downstream_of(&name) {
                    let Some(count) = remaining.get_mut(dependent.as_str()) else {
                        continue;
                    };
                    *count = count.saturating_sub(1);
                    if *count == 0 && states.get(dependent.as_str()) == Some(&ProjectState::Pending)
                    {
                        ready.push_back(dependent.clone());
                    }
                }
            }

            outcomes.insert(name, outcome);
        }

        let cancelled = deadline.is_some() || self.cancel.is_cancelled();
        let mut ordered = Vec::with_capacity(graph.len());
        for project in graph.projects() {
            let name = project.package_name();
            if let Some(outcome) = outcomes.remove(name) {
                ordered.push(outcome);
                continue;
            }
            if !cancelled {
                return Err(BuildError::Internal(format!(
                    "project '{name}' was never scheduled"
                )));
            }
            let outcome = ProjectOutcome::cancelled(name);
            self.notify(&outcome);
            ordered.push(outcome);
        }

        let report = BuildReport::new(ordered, started.elapsed());
        tracing::info!(
            "Build finished in {:.2?}: {} succeeded, {} from cache, {} failed, {} cancelled",
            report.duration,
            report.count(ProjectStatus::Succeeded),
            report.count(ProjectStatus::Skipped),
            report.count(ProjectStatus::Failed),
            report.count(ProjectStatus::Cancelled)
        );
        Ok(report)
    }
}

/// Shared per-session state handed to worker tasks
struct Worker {
    graph: Arc<ProjectGraph>,
    step: Arc<dyn BuildStep>,
    cache: Option<Arc<dyn CacheProvider>>,
    keys: Option<CacheKeyComputer>,
    output_folders: HashMap<String, Vec<String>>,
    default_output_folders: Vec<String>,
}

impl Worker {
    fn output_folders(&self, name: &str) -> &[String] {
        self.output_folders
            .get(name)
            .unwrap_or(&self.default_output_folders)
    }

    async fn build(&self, name: &str) -> Result<ProjectOutcome, BuildError> {
        let started = Instant::now();
        let project = self
            .graph
            .get(name)
            .ok_or_else(|| BuildError::Internal(format!("unknown project '{name}'")))?;
        let project_dir = project.absolute_folder(self.graph.root());
        let folders = self.output_folders(name);

        let cached = match (&self.cache, &self.keys) {
            (Some(cache), Some(keys)) => {
                match keys.compute_key(project, &self.graph, folders).await {
                    Ok(key) => Some((Arc::clone(cache), key)),
                    Err(e @ CacheKeyError::DependencyNotReady { .. }) => {
                        return Err(BuildError::Internal(e.to_string()));
                    }
                    Err(e) => {
                        tracing::error!("{e}");
                        return Ok(ProjectOutcome::failed(
                            name,
                            started.elapsed(),
                            &e.to_string(),
                        ));
                    }
                }
            }
            _ => None,
        };

        if let Some((cache, key)) = &cached {
            if restore(cache.as_ref(), key, name, &project_dir, folders).await {
                tracing::info!("{name} restored from cache");
                return Ok(ProjectOutcome::skipped(name, started.elapsed()));
            }
        }

        tracing::info!("Building {name}");
        if let Err(e) = self.step.run(project, &project_dir).await {
            tracing::error!("{e}");
            return Ok(ProjectOutcome::failed(
                name,
                started.elapsed(),
                &e.to_string(),
            ));
        }

        if let Some((cache, key)) = &cached {
            store(cache.as_ref(), key, name, &project_dir, folders).await;
        }

        Ok(ProjectOutcome::succeeded(name, started.elapsed()))
    }
}

/// Try to restore outputs; any failure is a miss
async fn restore(
    cache: &dyn CacheProvider,
    key: &CacheKey,
    name: &str,
    project_dir: &Path,
    folders: &[String],
) -> bool {
    let payload = match cache.get(key).await {
        Ok(payload) => payload,
        Err(CacheError::NotFound { .. }) => {
            tracing::debug!("Cache miss for {name} ({key})");
            return false;
        }
        Err(e) => {
            tracing::warn!("Cache read for {name} failed, building instead: {e}");
            return false;
        }
    };

    let dir = project_dir.to_path_buf();
    let folders = folders.to_vec();
    let unpacked =
        tokio::task::spawn_blocking(move || archive::unpack_outputs(&payload, &dir, &folders))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));

    if let Err(error) = unpacked {
        let e = BuildError::Outputs {
            project: name.to_string(),
            error,
        };
        tracing::warn!("{e}, building instead");
        return false;
    }
    true
}

/// Archive outputs and write them to the cache; failures are logged only
async fn store(
    cache: &dyn CacheProvider,
    key: &CacheKey,
    name: &str,
    project_dir: &Path,
    folders: &[String],
) {
    if !cache.is_write_allowed() {
        tracing::debug!("Cache writes disabled, not storing {name}");
        return;
    }

    match cache.exists(key).await {
        Ok(true) => {
            tracing::debug!("Cache entry for {name} already exists");
            return;
        }
        Ok(false) => {}
        Err(e) => tracing::debug!("Existence check for {name} failed: {e}"),
    }

    let dir = project_dir.to_path_buf();
    let folders = folders.to_vec();
    let packed = tokio::task::spawn_blocking(move || archive::pack_outputs(&dir, &folders))
        .await
        .map_err(|e| e.to_string())
        .and_then(|r| r.map_err(|e| e.to_string()));
    let payload = match packed {
        Ok(payload) => payload,
        Err(error) => {
            let e = BuildError::Outputs {
                project: name.to_string(),
                error,
            };
            tracing::warn!("{e}");
            return;
        }
    };

    match cache.put(key, payload).await {
        Ok(()) => tracing::debug!("Stored {name} in cache ({key})"),
        Err(e) => tracing::warn!("{e}"),
    }
}
