//! Infrastructure layer
//!
//! Handles all I/O operations: network, filesystem, and external processes.
//! This module is the only place where side effects occur.

pub mod archive;
pub mod cache;
pub mod dirs;
pub mod filesystem;
pub mod hashing;
pub mod loader;
pub mod process;
