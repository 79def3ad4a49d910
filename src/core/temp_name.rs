//! Temp build identifier allocation
//!
//! Every project gets a short identifier used by isolated build tooling. The
//! identifier is persisted in the link map, so the assignment must be stable:
//! the same set of package names always yields the same identifiers, no
//! matter the order they were declared in.

use std::collections::{BTreeMap, HashSet};

/// Separator between a base identifier and its collision suffix
const SUFFIX_SEPARATOR: char = '_';

/// Strip an npm-style `@scope/` prefix from a package name
pub fn unscoped_name(package_name: &str) -> &str {
    match package_name.strip_prefix('@') {
        Some(rest) => rest.split_once('/').map_or(package_name, |(_, local)| local),
        None => package_name,
    }
}

/// Assign a unique temp build identifier to every package name
///
/// Names are processed in byte-wise sorted order. Collisions on the
/// unscoped name are resolved with the lowest free suffix, starting at `_2`.
pub fn assign<S: AsRef<str>>(package_names: &[S]) -> BTreeMap<String, String> {
    let mut sorted: Vec<&str> = package_names.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut taken: HashSet<String> = HashSet::with_capacity(sorted.len());
    let mut assigned = BTreeMap::new();

    for name in sorted {
        let base = unscoped_name(name);
        let mut candidate = base.to_string();
        let mut counter = 2u32;
        while taken.contains(&candidate) {
            candidate = format!("{base}{SUFFIX_SEPARATOR}{counter}");
            counter += 1;
        }
        taken.insert(candidate.clone());
        assigned.insert(name.to_string(), candidate);
    }

    assigned
}
