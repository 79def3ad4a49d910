//! Core business logic module
//!
//! Everything here works on typed, validated structures. Reading files,
//! talking to the network and running processes belong in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`manifest`] - `monobuild.toml` and `package.json` parsing and validation
//! - [`project`] - Project descriptors and graph nodes
//! - [`temp_name`] - Temp build id allocation
//! - [`graph`] - Project graph construction and queries
//! - [`cache_config`] - Build cache configuration
//! - [`cache_key`] - Cache key computation
//! - [`builder`] - Build orchestration
//! - [`report`] - Build session results
//! - [`link_map`] - Persisted link map
//! - [`version`] - Tool version checks

pub mod builder;
pub mod cache_config;
pub mod cache_key;
pub mod graph;
pub mod link_map;
pub mod manifest;
pub mod project;
pub mod report;
pub mod temp_name;
pub mod version;
