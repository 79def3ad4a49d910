//! Monobuild - incremental builds for JavaScript monorepos
//!
//! This library provides the orchestration core of a monorepo build tool:
//! the project graph, temp build ids, content-addressed cache keys, cache
//! providers and a parallel build orchestrator.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic (graph, cache keys, scheduling)
//! - [`infra`] - Infrastructure layer (filesystem, network, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
