//! File-system collaborator used by the commit operations.
//!
//! The engine computes final text up front and only then calls into a
//! [`FileSystem`]. [`DiskFs`] talks to the real disk; [`MemoryFs`] keeps files
//! in memory and can be told to fail specific operations.

use crate::safety::{SafetyError, WorkspaceGuard};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FsOp {
    Read,
    Write,
    Delete,
    Rename,
}

impl fmt::Display for FsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FsOp::Read => "read",
            FsOp::Write => "write",
            FsOp::Delete => "delete",
            FsOp::Rename => "rename",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum FsError {
    #[error("failed to {op} {path}: {source}")]
    Io {
        op: FsOp,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

impl FsError {
    fn io(op: FsOp, path: &Path, source: io::Error) -> Self {
        FsError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the underlying error means the file does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            FsError::Io { source, .. } | FsError::Safety(SafetyError::Canonicalize(source)) => {
                source.kind() == io::ErrorKind::NotFound
            }
            FsError::Safety(_) => false,
        }
    }
}

/// The operations the commit engine needs from a file system.
///
/// Each call either completes or fails on its own; none are retried.
pub trait FileSystem {
    fn read_file(&self, path: &Path) -> Result<String, FsError>;
    fn write_file(&self, path: &Path, text: &str) -> Result<(), FsError>;
    fn delete_file(&self, path: &Path) -> Result<(), FsError>;
    fn rename_file(&self, from: &Path, to: &Path) -> Result<(), FsError>;
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        (**self).read_file(path)
    }

    fn write_file(&self, path: &Path, text: &str) -> Result<(), FsError> {
        (**self).write_file(path, text)
    }

    fn delete_file(&self, path: &Path) -> Result<(), FsError> {
        (**self).delete_file(path)
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        (**self).rename_file(from, to)
    }
}

/// The real disk.
///
/// Writes are atomic (tempfile + fsync + rename) and keep the permissions of
/// the file they replace. With a [`WorkspaceGuard`] attached, every path is
/// validated before it is touched.
#[derive(Debug, Clone)]
pub struct DiskFs {
    guard: Option<WorkspaceGuard>,
    touch_mtime: bool,
}

impl Default for DiskFs {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskFs {
    pub fn new() -> Self {
        Self {
            guard: None,
            touch_mtime: true,
        }
    }

    pub fn with_guard(mut self, guard: WorkspaceGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Whether to bump the mtime of written files (on by default) so build
    /// tools notice the change.
    pub fn touch_mtime(mut self, touch: bool) -> Self {
        self.touch_mtime = touch;
        self
    }

    fn existing(&self, path: &Path) -> Result<PathBuf, FsError> {
        match &self.guard {
            Some(guard) => Ok(guard.validate_path(path)?),
            None => Ok(path.to_path_buf()),
        }
    }

    fn maybe_new(&self, path: &Path) -> Result<PathBuf, FsError> {
        match &self.guard {
            Some(guard) => Ok(guard.validate_new_path(path)?),
            None => Ok(path.to_path_buf()),
        }
    }
}

impl FileSystem for DiskFs {
    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        let path = self.existing(path)?;
        fs::read_to_string(&path).map_err(|e| FsError::io(FsOp::Read, &path, e))
    }

    fn write_file(&self, path: &Path, text: &str) -> Result<(), FsError> {
        let path = self.maybe_new(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::io(FsOp::Write, parent, e))?;
        }
        atomic_write(&path, text.as_bytes()).map_err(|e| FsError::io(FsOp::Write, &path, e))?;

        if self.touch_mtime {
            let now = filetime::FileTime::now();
            filetime::set_file_mtime(&path, now).map_err(|e| FsError::io(FsOp::Write, &path, e))?;
        }
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<(), FsError> {
        let path = self.existing(path)?;
        fs::remove_file(&path).map_err(|e| FsError::io(FsOp::Delete, &path, e))
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let from = self.existing(from)?;
        let to = self.maybe_new(to)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::io(FsOp::Rename, parent, e))?;
        }
        fs::rename(&from, &to).map_err(|e| FsError::io(FsOp::Rename, &from, e))
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or nothing changes.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    // Same directory keeps the rename on one file system
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent directory")
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// In-memory file system keyed by path.
///
/// Operations registered with [`MemoryFs::fail_on`] return an I/O error
/// without changing anything.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, String>>,
    failures: Mutex<BTreeSet<(FsOp, PathBuf)>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.lock_files().insert(path.into(), text.into());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock_files().get(path.as_ref()).cloned()
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.lock_files().contains_key(path.as_ref())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock_files().keys().cloned().collect()
    }

    pub fn fail_on(&self, op: FsOp, path: impl Into<PathBuf>) {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((op, path.into()));
    }

    fn lock_files(&self) -> MutexGuard<'_, BTreeMap<PathBuf, String>> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, op: FsOp, path: &Path) -> Result<(), FsError> {
        let failures = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if failures.contains(&(op, path.to_path_buf())) {
            return Err(FsError::io(
                op,
                path,
                io::Error::new(io::ErrorKind::Other, "injected failure"),
            ));
        }
        Ok(())
    }

    fn not_found(op: FsOp, path: &Path) -> FsError {
        FsError::io(op, path, io::Error::from(io::ErrorKind::NotFound))
    }
}

impl FileSystem for MemoryFs {
    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        self.check(FsOp::Read, path)?;
        self.get(path)
            .ok_or_else(|| Self::not_found(FsOp::Read, path))
    }

    fn write_file(&self, path: &Path, text: &str) -> Result<(), FsError> {
        self.check(FsOp::Write, path)?;
        self.insert(path, text);
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<(), FsError> {
        self.check(FsOp::Delete, path)?;
        self.lock_files()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(FsOp::Delete, path))
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        self.check(FsOp::Rename, from)?;
        let mut files = self.lock_files();
        let text = files
            .remove(from)
            .ok_or_else(|| Self::not_found(FsOp::Rename, from))?;
        files.insert(to.to_path_buf(), text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_write_creates_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("app/models/user.rb");

        DiskFs::new().write_file(&path, "class User; end").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "class User; end");
    }

    #[test]
    fn test_disk_write_replaces_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test.txt");
        fs::write(&path, b"original content").unwrap();

        let disk = DiskFs::new().touch_mtime(false);
        disk.write_file(&path, "modified content").unwrap();

        assert_eq!(disk.read_file(&path).unwrap(), "modified content");
    }

    #[test]
    #[cfg(unix)]
    fn test_disk_write_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("script.sh");
        fs::write(&path, b"echo hi").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        DiskFs::new().write_file(&path, "echo bye").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_disk_rename_and_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let from = temp_dir.path().join("foo.rb");
        let to = temp_dir.path().join("lib/bar.rb");
        fs::write(&from, b"hello world").unwrap();

        let disk = DiskFs::new();
        disk.rename_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "hello world");

        disk.delete_file(&to).unwrap();
        assert!(!to.exists());
    }

    #[test]
    fn test_disk_delete_missing_file_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = DiskFs::new()
            .delete_file(&temp_dir.path().join("missing.rb"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_disk_guard_blocks_escape() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();

        let guard = WorkspaceGuard::new(&workspace).unwrap();
        let disk = DiskFs::new().with_guard(guard);

        let err = disk
            .write_file(&workspace.join("../outside.rb"), "x")
            .unwrap_err();
        assert!(matches!(
            err,
            FsError::Safety(SafetyError::OutsideWorkspace { .. })
        ));
        assert!(!temp_dir.path().join("outside.rb").exists());
    }

    #[test]
    fn test_guarded_missing_file_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();
        let disk = DiskFs::new().with_guard(guard);

        let err = disk.read_file(&temp_dir.path().join("missing.rb")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_memory_fs_operations() {
        let memory = MemoryFs::new().with_file("a.rb", "one");

        memory.write_file(Path::new("b.rb"), "two").unwrap();
        memory.rename_file(Path::new("a.rb"), Path::new("c.rb")).unwrap();
        memory.delete_file(Path::new("b.rb")).unwrap();

        assert_eq!(memory.paths(), vec![PathBuf::from("c.rb")]);
        assert_eq!(memory.read_file(Path::new("c.rb")).unwrap(), "one");
        assert!(memory.read_file(Path::new("a.rb")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_memory_fs_injected_failure() {
        let memory = MemoryFs::new().with_file("a.rb", "one");
        memory.fail_on(FsOp::Write, "a.rb");

        let err = memory.write_file(Path::new("a.rb"), "two").unwrap_err();
        assert!(matches!(err, FsError::Io { op: FsOp::Write, .. }));
        assert_eq!(memory.get("a.rb").as_deref(), Some("one"));
    }
}
