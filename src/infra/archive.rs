//! Output folder archives
//!
//! Cache payloads are gzip-compressed tarballs of a project's output folders,
//! with entry paths relative to the project folder. Archives are
//! deterministic: entries are sorted and carry no timestamps or owners.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tar::{EntryType, Header};
use walkdir::WalkDir;

use crate::infra::hashing::normalize_relative;

/// Pack the given output folders of `project_dir`
///
/// Missing folders are skipped; an archive of nothing is still valid.
pub fn pack_outputs(project_dir: &Path, folders: &[String]) -> io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut sorted: Vec<&String> = folders.iter().collect();
    sorted.sort();
    sorted.dedup();

    for folder in sorted {
        let root = project_dir.join(folder);
        if !root.exists() {
            continue;
        }

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::other)?;
            let rel = entry
                .path()
                .strip_prefix(project_dir)
                .map_err(io::Error::other)?;
            let rel = normalize_relative(rel);
            let metadata = fs::symlink_metadata(entry.path())?;
            let file_type = metadata.file_type();

            let mut header = Header::new_gnu();
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);

            if file_type.is_dir() {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, &rel, io::empty())?;
            } else if file_type.is_file() {
                header.set_entry_type(EntryType::Regular);
                header.set_mode(file_mode(&metadata));
                header.set_size(metadata.len());
                builder.append_data(&mut header, &rel, File::open(entry.path())?)?;
            } else if file_type.is_symlink() {
                let target = fs::read_link(entry.path())?;
                header.set_entry_type(EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                builder.append_link(&mut header, &rel, &target)?;
            }
        }
    }

    builder.into_inner()?.finish()
}

/// Replace the output folders of `project_dir` with an archive's content
pub fn unpack_outputs(payload: &[u8], project_dir: &Path, folders: &[String]) -> io::Result<()> {
    for folder in folders {
        let path = project_dir.join(folder);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        }
    }

    let mut archive = tar::Archive::new(GzDecoder::new(payload));
    archive.set_preserve_mtime(false);
    archive.unpack(project_dir)
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 == 0 {
        0o644
    } else {
        0o755
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}
