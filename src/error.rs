//! Error types for monobuild
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Semantic configuration errors
///
/// Always fatal: raised before any build work starts.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A package name is declared more than once
    #[error("Package '{name}' is declared more than once in the manifest")]
    DuplicatePackage { name: String },

    /// A cyclicDependencyProjects entry does not resolve
    #[error("Project '{project}' lists unknown project '{entry}' in cyclicDependencyProjects")]
    UnknownCyclicDependency { project: String, entry: String },

    /// Dependency cycle outside the whitelist
    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// Invalid package name
    #[error("Invalid package name '{name}' at {field}")]
    InvalidPackageName { name: String, field: String },

    /// Conflicting keys in a configuration file
    #[error("Conflicting settings in '{path}': {message}")]
    ConflictingKeys { path: String, message: String },

    /// Missing required section
    #[error("Missing required setting '{field}' in '{path}'")]
    MissingField { path: String, field: String },

    /// A setting has an unusable value
    #[error("Invalid setting '{field}' in '{path}': {message}")]
    InvalidValue {
        path: String,
        field: String,
        message: String,
    },

    /// Configuration file could not be read
    #[error("Failed to read '{path}': {error}")]
    Unreadable { path: PathBuf, error: String },

    /// Configuration file could not be parsed
    #[error("Failed to parse '{path}': {error}")]
    Parse { path: PathBuf, error: String },
}

/// Cache provider errors
///
/// None of these are fatal to a build session: reads degrade to misses and
/// failed writes are logged.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No entry for the key
    #[error("Cache entry '{key}' not found")]
    NotFound { key: String },

    /// Writes are disabled for this provider
    #[error("Cache writes are not allowed for provider '{provider}'")]
    WriteDenied { provider: String },

    /// Write attempted but failed
    #[error("Failed to write cache entry '{key}': {error}")]
    WriteFailed { key: String, error: String },

    /// Read attempted but failed
    #[error("Failed to read cache entry '{key}': {error}")]
    ReadFailed { key: String, error: String },
}

/// Cache key computation errors
#[derive(Error, Debug)]
pub enum CacheKeyError {
    /// A dependency key was requested before it was computed
    #[error("Cache key for '{project}' requested before dependency '{dependency}' was resolved")]
    DependencyNotReady { project: String, dependency: String },

    /// Project inputs could not be hashed
    #[error("Failed to hash inputs of '{project}': {error}")]
    Hashing { project: String, error: String },
}

/// Build errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Build step failed
    #[error("Build failed for project '{project}': {error}")]
    BuildFailed { project: String, error: String },

    /// Orchestrator invariant violated
    #[error("Internal scheduler error: {0}")]
    Internal(String),

    /// Archive or restore of project outputs failed
    #[error("Failed to process outputs of '{project}': {error}")]
    Outputs { project: String, error: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Tool version errors
#[derive(Error, Debug, PartialEq)]
pub enum VersionError {
    /// Tool is older than the manifest requires
    #[error("monobuild {current} does not satisfy minimumToolVersion '{constraint}' from {origin}. Please upgrade monobuild.")]
    VersionMismatch {
        current: String,
        constraint: String,
        origin: String,
    },

    /// Invalid version constraint format
    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    /// Invalid version format
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },
}

/// Top-level monobuild error type
#[derive(Error, Debug)]
pub enum MonobuildError {
    /// Manifest not found
    #[error("No monobuild.toml found in '{path}' or any parent directory")]
    ManifestNotFound { path: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Version error
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Build error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}
