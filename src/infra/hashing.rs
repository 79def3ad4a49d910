//! Content hashing of project inputs
//!
//! The own-content hash of a project covers every file under its folder
//! except output folders and [`defaults::IGNORED_INPUT_FOLDERS`]. Files are
//! hashed individually and the `(relative path, digest)` pairs are sorted
//! before the final digest, so enumeration order never matters.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Component, Path};
use walkdir::{DirEntry, WalkDir};

use crate::config::defaults;
use crate::error::FilesystemError;

/// SHA-256 of a file's content, hex encoded
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Relative path with `/` separators
pub fn normalize_relative(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_excluded(entry: &DirEntry, root: &Path, excluded: &[String]) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if defaults::IGNORED_INPUT_FOLDERS.contains(&name.as_ref()) {
        return true;
    }
    entry
        .path()
        .strip_prefix(root)
        .map(|rel| {
            let rel = normalize_relative(rel);
            excluded.iter().any(|folder| rel == folder.trim_matches('/'))
        })
        .unwrap_or(false)
}

/// Sorted `(relative path, digest)` pairs for every input file
pub fn list_input_digests(
    root: &Path,
    excluded: &[String],
) -> Result<Vec<(String, String)>, FilesystemError> {
    if !root.is_dir() {
        return Err(FilesystemError::ReadFile {
            path: root.to_path_buf(),
            error: "project folder does not exist".to_string(),
        });
    }

    let mut pairs = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded(e, root, excluded));

    for entry in walker {
        let entry = entry.map_err(|e| FilesystemError::ReadFile {
            path: root.to_path_buf(),
            error: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let digest = hash_file(entry.path()).map_err(|e| FilesystemError::ReadFile {
            path: entry.path().to_path_buf(),
            error: e.to_string(),
        })?;
        pairs.push((normalize_relative(rel), digest));
    }

    pairs.sort();
    Ok(pairs)
}

/// Own-content hash of a project folder
pub fn hash_project_inputs(root: &Path, excluded: &[String]) -> Result<String, FilesystemError> {
    let pairs = list_input_digests(root, excluded)?;

    let mut hasher = Sha256::new();
    for (path, digest) in &pairs {
        hasher.update(path.as_bytes());
        hasher.update(b"\0");
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }

    tracing::trace!("Hashed {} input files under {}", pairs.len(), root.display());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_hash_is_stable() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/index.js", "export {}");
        write(temp.path(), "package.json", "{}");

        let first = hash_project_inputs(temp.path(), &[]).unwrap();
        let second = hash_project_inputs(temp.path(), &[]).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_content_change_changes_hash() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/index.js", "one");
        let before = hash_project_inputs(temp.path(), &[]).unwrap();

        write(temp.path(), "src/index.js", "two");
        let after = hash_project_inputs(temp.path(), &[]).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_rename_changes_hash() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.js", "same");
        let before = hash_project_inputs(temp.path(), &[]).unwrap();

        std::fs::rename(temp.path().join("a.js"), temp.path().join("b.js")).unwrap();
        let after = hash_project_inputs(temp.path(), &[]).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_output_and_ignored_folders_excluded() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/index.js", "code");
        let before = hash_project_inputs(temp.path(), &["dist".to_string()]).unwrap();

        write(temp.path(), "dist/index.js", "built");
        write(temp.path(), "node_modules/dep/index.js", "dep");
        write(temp.path(), "src/node_modules/x.js", "nested");
        let after = hash_project_inputs(temp.path(), &["dist".to_string()]).unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn test_pairs_are_sorted() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "z.txt", "z");
        write(temp.path(), "a/b.txt", "b");
        write(temp.path(), "m.txt", "m");

        let pairs = list_input_digests(temp.path(), &[]).unwrap();
        let paths: Vec<&str> = pairs.iter().map(|(p, _)| p.as_str()).collect();

        assert_eq!(paths, ["a/b.txt", "m.txt", "z.txt"]);
    }

    #[test]
    fn test_missing_folder_is_error() {
        let temp = TempDir::new().unwrap();

        assert!(hash_project_inputs(&temp.path().join("missing"), &[]).is_err());
    }
}
