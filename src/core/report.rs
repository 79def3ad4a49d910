//! Build session report
//!
//! One [`ProjectOutcome`] per project, in declaration order.

use serde::{Serialize, Serializer};
use std::time::Duration;

/// Terminal state of a project in one build session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Outputs restored from the cache, build step not run
    Skipped,
    /// Build step ran and succeeded
    Succeeded,
    /// Build step failed, or a dependency failed
    Failed,
    /// Never dispatched because the session was cancelled
    Cancelled,
}

impl ProjectStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Result of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOutcome {
    pub package_name: String,
    pub status: ProjectStatus,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub cache_hit: bool,
    /// Failed dependency that prevented this project from running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProjectOutcome {
    fn new(package_name: &str, status: ProjectStatus, duration: Duration) -> Self {
        Self {
            package_name: package_name.to_string(),
            status,
            duration,
            cache_hit: false,
            blocked_by: None,
            error: None,
        }
    }

    /// Restored from cache
    pub fn skipped(package_name: &str, duration: Duration) -> Self {
        Self {
            cache_hit: true,
            ..Self::new(package_name, ProjectStatus::Skipped, duration)
        }
    }

    pub fn succeeded(package_name: &str, duration: Duration) -> Self {
        Self::new(package_name, ProjectStatus::Succeeded, duration)
    }

    pub fn failed(package_name: &str, duration: Duration, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(package_name, ProjectStatus::Failed, duration)
        }
    }

    /// Not run because `dependency` failed
    pub fn blocked(package_name: &str, dependency: &str) -> Self {
        Self {
            blocked_by: Some(dependency.to_string()),
            ..Self::new(package_name, ProjectStatus::Failed, Duration::ZERO)
        }
    }

    pub fn cancelled(package_name: &str) -> Self {
        Self::new(package_name, ProjectStatus::Cancelled, Duration::ZERO)
    }

    /// Whether the build step itself ran and failed
    pub fn is_direct_failure(&self) -> bool {
        self.status == ProjectStatus::Failed && self.blocked_by.is_none()
    }
}

/// Outcome of a whole build session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub outcomes: Vec<ProjectOutcome>,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl BuildReport {
    pub fn new(outcomes: Vec<ProjectOutcome>, duration: Duration) -> Self {
        Self { outcomes, duration }
    }

    /// Outcome of one project
    pub fn get(&self, package_name: &str) -> Option<&ProjectOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.package_name == package_name)
    }

    /// Status of one project
    pub fn status(&self, package_name: &str) -> Option<ProjectStatus> {
        self.get(package_name).map(|o| o.status)
    }

    /// True when no project failed or was cancelled
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|o| o.status.is_failure())
    }

    pub fn count(&self, status: ProjectStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Projects whose build step failed
    pub fn failed(&self) -> impl Iterator<Item = &ProjectOutcome> {
        self.outcomes.iter().filter(|o| o.is_direct_failure())
    }

    /// Projects not run because a dependency failed
    pub fn blocked(&self) -> impl Iterator<Item = &ProjectOutcome> {
        self.outcomes.iter().filter(|o| o.blocked_by.is_some())
    }

    pub fn cache_hits(&self) -> usize {
        self.outcomes.iter().filter(|o| o.cache_hit).count()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
