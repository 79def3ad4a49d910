//! Tool version compatibility
//!
//! A repository manifest may declare `minimumToolVersion`. The check runs
//! against the raw document, before it is deserialized into typed
//! structures, since an outdated tool may not understand the rest of it.

use semver::{Version, VersionReq};

use crate::error::VersionError;

/// Current monobuild version from Cargo.toml
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check the running tool against a version constraint
///
/// A bare version such as `0.2.0` is read as `>=0.2.0`.
pub fn check_tool_version(constraint: &str, origin: &str) -> Result<(), VersionError> {
    check_version_constraint(CURRENT_VERSION, constraint, origin)
}

/// Check if a version satisfies a constraint
pub fn check_version_constraint(
    version: &str,
    constraint: &str,
    origin: &str,
) -> Result<(), VersionError> {
    let parsed_version = Version::parse(version).map_err(|e| VersionError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })?;

    let version_req = parse_constraint(constraint)?;

    if version_req.matches(&parsed_version) {
        Ok(())
    } else {
        Err(VersionError::VersionMismatch {
            current: version.to_string(),
            constraint: constraint.to_string(),
            origin: origin.to_string(),
        })
    }
}

/// Parse a constraint, treating a bare version as a minimum
pub fn parse_constraint(constraint: &str) -> Result<VersionReq, VersionError> {
    let trimmed = constraint.trim();
    let normalized = if Version::parse(trimmed).is_ok() {
        format!(">={trimmed}")
    } else {
        trimmed.to_string()
    };

    VersionReq::parse(&normalized).map_err(|e| VersionError::InvalidConstraint {
        constraint: constraint.to_string(),
        reason: e.to_string(),
    })
}
