//! Configuration constants
//!
//! File locations and default values shared by the CLI and the core.

pub mod defaults;
