//! Workspace file listing used for before/after diffing

use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories never descended into
pub const IGNORED_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__", ".venv"];

pub trait Workspace: Send + Sync {
    /// Files under `dir`, relative to it
    fn list_files(&self, dir: &Path) -> io::Result<HashSet<PathBuf>>;
}

/// Filesystem-backed workspace
#[derive(Debug, Clone, Default)]
pub struct FsWorkspace;

impl Workspace for FsWorkspace {
    fn list_files(&self, dir: &Path) -> io::Result<HashSet<PathBuf>> {
        let mut files = HashSet::new();
        let walker = WalkDir::new(dir).follow_links(false).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| IGNORED_DIRS.contains(&name)))
        });

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(dir) {
                files.insert(relative.to_path_buf());
            }
        }
        Ok(files)
    }
}

/// Express `path` relative to `root` when it lies under it
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Reported writes plus files that appeared between the snapshots
pub fn modified_files(
    reported: impl IntoIterator<Item = PathBuf>,
    before: &HashSet<PathBuf>,
    after: &HashSet<PathBuf>,
) -> BTreeSet<PathBuf> {
    let mut files: BTreeSet<PathBuf> = reported.into_iter().collect();
    files.extend(after.difference(before).cloned());
    files
}
