//! Cache key computation
//!
//! A project's key is a SHA-256 over its own-content hash, the cache
//! provider identifier and the keys of its scheduling dependencies. Keys are
//! memoized for the session, so each one is computed at most once and a
//! change in any dependency propagates to every dependent.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::core::graph::ProjectGraph;
use crate::core::project::Project;
use crate::error::CacheKeyError;
use crate::infra::hashing;

/// Content fingerprint of one project build (64 hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Combine an own-content hash with provider id and dependency keys
///
/// Dependency keys are sorted first, so their order does not matter.
pub fn combine_key(own_hash: &str, provider_id: &str, dependency_keys: &[CacheKey]) -> CacheKey {
    let mut sorted: Vec<&CacheKey> = dependency_keys.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(own_hash.as_bytes());
    hasher.update(b"\0");
    hasher.update(provider_id.as_bytes());
    for key in sorted {
        hasher.update(b"\0");
        hasher.update(key.as_str().as_bytes());
    }

    CacheKey(hex::encode(hasher.finalize()))
}

/// Session-scoped, memoizing key computer
///
/// Safe to share between workers.
#[derive(Debug)]
pub struct CacheKeyComputer {
    provider_id: String,
    keys: Mutex<HashMap<String, CacheKey>>,
}

impl CacheKeyComputer {
    pub fn new(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Previously computed key for a project
    pub fn get(&self, package_name: &str) -> Option<CacheKey> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(package_name)
            .cloned()
    }

    /// Number of keys computed so far
    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute (or return the memoized) key of `project`
    ///
    /// Every scheduling dependency must already have a key; callers walk the
    /// graph in topological order. `output_folders` are excluded from the
    /// own-content hash.
    pub async fn compute_key(
        &self,
        project: &Project,
        graph: &ProjectGraph,
        output_folders: &[String],
    ) -> Result<CacheKey, CacheKeyError> {
        let name = project.package_name();
        if let Some(key) = self.get(name) {
            return Ok(key);
        }

        let dependency_keys = self.dependency_keys(project)?;

        let folder = project.absolute_folder(graph.root());
        let excluded = output_folders.to_vec();
        let own_hash =
            tokio::task::spawn_blocking(move || hashing::hash_project_inputs(&folder, &excluded))
                .await
                .map_err(|e| CacheKeyError::Hashing {
                    project: name.to_string(),
                    error: e.to_string(),
                })?
                .map_err(|e| CacheKeyError::Hashing {
                    project: name.to_string(),
                    error: e.to_string(),
                })?;

        Ok(self.record(name, &own_hash, &dependency_keys))
    }

    /// Compute a key from an already known own-content hash
    pub fn compute_key_with_hash(
        &self,
        project: &Project,
        own_hash: &str,
    ) -> Result<CacheKey, CacheKeyError> {
        if let Some(key) = self.get(project.package_name()) {
            return Ok(key);
        }
        let dependency_keys = self.dependency_keys(project)?;
        Ok(self.record(project.package_name(), own_hash, &dependency_keys))
    }

    fn dependency_keys(&self, project: &Project) -> Result<Vec<CacheKey>, CacheKeyError> {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        project
            .dependency_projects()
            .iter()
            .map(|dep| {
                keys.get(dep)
                    .cloned()
                    .ok_or_else(|| CacheKeyError::DependencyNotReady {
                        project: project.package_name().to_string(),
                        dependency: dep.clone(),
                    })
            })
            .collect()
    }

    fn record(&self, name: &str, own_hash: &str, dependency_keys: &[CacheKey]) -> CacheKey {
        let key = combine_key(own_hash, &self.provider_id, dependency_keys);
        tracing::debug!("Cache key for {name}: {key}");
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(key)
            .clone()
    }
}
