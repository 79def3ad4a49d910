//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying progress bars,
//! status lines, and formatted messages to the user.

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::report::{BuildReport, ProjectOutcome, ProjectStatus};

/// Create a progress bar for a build session
pub fn create_build_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} projects ({msg})")
    {
        pb.set_style(style.progress_chars("█▓▒░"));
    }
    pb
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

/// One line describing a finished project
pub fn outcome_line(outcome: &ProjectOutcome) -> String {
    let name = &outcome.package_name;
    match outcome.status {
        ProjectStatus::Skipped => format!("{} {name} (from cache)", status::INFO),
        ProjectStatus::Succeeded => {
            format!("{} {name} ({:.2?})", status::SUCCESS, outcome.duration)
        }
        ProjectStatus::Failed => match &outcome.blocked_by {
            Some(dependency) => format!("{} {name} (blocked by {dependency})", status::WARNING),
            None => format!("{} {name} failed", status::ERROR),
        },
        ProjectStatus::Cancelled => format!("{} {name} (cancelled)", status::WARNING),
    }
}

/// Final summary of a build session
pub fn summary(report: &BuildReport) -> String {
    let mut lines = Vec::new();
    for outcome in report.failed() {
        lines.push(format!("{} {} failed:", status::ERROR, outcome.package_name));
        if let Some(error) = &outcome.error {
            for line in error.lines() {
                lines.push(format!("    {line}"));
            }
        }
    }

    let headline = format!(
        "{} succeeded, {} from cache, {} failed, {} cancelled in {:.2?}",
        report.count(ProjectStatus::Succeeded),
        report.count(ProjectStatus::Skipped),
        report.count(ProjectStatus::Failed),
        report.count(ProjectStatus::Cancelled),
        report.duration
    );
    let prefix = if report.is_success() {
        status::SUCCESS
    } else {
        status::ERROR
    };
    lines.push(format!("{prefix} {headline}"));
    lines.join("\n")
}

/// Human readable byte count
#[allow(clippy::cast_precision_loss)]
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes < 1024 {
        format!("{size_bytes} bytes")
    } else if size_bytes < 1024 * 1024 {
        format!("{:.1} KB", size_bytes as f64 / 1024.0)
    } else if size_bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", size_bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", size_bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}
