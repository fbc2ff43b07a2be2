//! Filesystem operations the cleaner mutates the tree through.

use std::fs;
use std::io;
use std::path::Path;

/// The mutating and attribute-level operations used by deletion and rewriting.
///
/// Enumeration stays on the real filesystem; only the calls that can fail for
/// reasons outside the cleaner's control go through this trait so tests can
/// inject failures.
pub trait FileSystem {
    fn is_readonly(&self, path: &Path) -> io::Result<bool>;

    /// Make the entry writable by its owner. Symlinks are left alone.
    fn clear_readonly(&self, path: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn is_readonly(&self, path: &Path) -> io::Result<bool> {
        Ok(fs::metadata(path)?.permissions().readonly())
    }

    fn clear_readonly(&self, path: &Path) -> io::Result<()> {
        let metadata = fs::symlink_metadata(path)?;
        if metadata.is_symlink() {
            return Ok(());
        }
        set_writable(path, metadata.permissions())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }
}

#[cfg(unix)]
fn set_writable(path: &Path, mut permissions: fs::Permissions) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = permissions.mode();
    if mode & 0o200 != 0 {
        return Ok(());
    }
    permissions.set_mode(mode | 0o200);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn set_writable(path: &Path, mut permissions: fs::Permissions) -> io::Result<()> {
    if !permissions.readonly() {
        return Ok(());
    }
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}
