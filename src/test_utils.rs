//! Test utilities for property-based testing
//!
//! This module provides generators for proptest.

pub mod generators {
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,8}"
    }

    /// Generate a valid npm package name, scoped or not
    ///
    /// Short segments and a small scope pool make unscoped collisions common.
    pub fn package_name() -> impl Strategy<Value = String> {
        (
            proptest::option::of(prop_oneof!["acme", "tools", "internal"]),
            prop_oneof![
                3 => prop_oneof!["core", "utils", "app", "cli"].prop_map(String::from),
                2 => segment(),
            ],
        )
            .prop_map(|(scope, name)| match scope {
                Some(scope) => format!("@{scope}/{name}"),
                None => name,
            })
    }
}
