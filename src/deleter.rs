//! Removal of candidate files and directories.

use crate::error::CleanError;
use crate::filesystem::FileSystem;

use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Deletes candidates, clearing read-only attributes first in force mode.
pub struct Deleter<'a> {
    fs: &'a dyn FileSystem,
    force: bool,
    dry_run: bool,
}

impl<'a> Deleter<'a> {
    pub fn new(fs: &'a dyn FileSystem, force: bool, dry_run: bool) -> Self {
        Self { fs, force, dry_run }
    }

    /// Recursively delete a directory and everything under it
    pub fn delete_directory(&self, dir: &Path) -> Result<(), CleanError> {
        if self.dry_run {
            return Ok(());
        }

        if self.force {
            // Recursive removal fails on the first read-only child, so clear the whole subtree
            for entry in WalkDir::new(dir).follow_links(false) {
                let entry = entry.map_err(|err| {
                    let path = err.path().unwrap_or(dir).to_path_buf();
                    CleanError::access(path, err.into())
                })?;
                if entry.path_is_symlink() {
                    continue;
                }
                self.fs
                    .clear_readonly(entry.path())
                    .map_err(|err| CleanError::access(entry.path(), err))?;
            }
        }

        self.fs
            .remove_dir_all(dir)
            .map_err(|err| CleanError::access(dir, err))
    }

    pub fn delete_file(&self, file: &Path) -> Result<(), CleanError> {
        if self.dry_run {
            return Ok(());
        }

        if self.force {
            self.fs
                .clear_readonly(file)
                .map_err(|err| CleanError::access(file, err))?;
        }

        self.fs
            .remove_file(file)
            .map_err(|err| CleanError::access(file, err))
    }
}

/// Total size of all regular files under a path, without following symlinks
pub fn disk_usage(path: &Path) -> u64 {
    let metadata = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            tracing::debug!("cannot stat {}: {}", path.display(), err);
            return 0;
        }
    };

    if metadata.is_file() {
        return metadata.len();
    }
    if !metadata.is_dir() {
        return 0;
    }

    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
