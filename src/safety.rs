use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Keeps every path an edit set touches inside the root it was analyzed from.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical root all edit-set paths are relative to
    root: PathBuf,
    /// Canonical paths to forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Create a guard for `root`.
    ///
    /// The root is canonicalized to handle symlinks correctly. Toolchain
    /// directories under the home directory and the root's `.git` directory
    /// are always forbidden.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;

        let mut forbidden_paths = Vec::new();

        if let Some(home) = home::home_dir() {
            for dir in [".cargo/registry", ".cargo/git", ".rustup"] {
                if let Ok(path) = home.join(dir).canonicalize() {
                    forbidden_paths.push(path);
                }
            }
        }

        if let Ok(git_dir) = root.join(".git").canonicalize() {
            forbidden_paths.push(git_dir);
        }

        Ok(Self {
            root,
            forbidden_paths,
        })
    }

    /// Forbid additional directories. Relative entries resolve against the
    /// root; entries that do not exist are skipped.
    pub fn with_forbidden<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for dir in dirs {
            if let Ok(path) = self.absolute(dir.as_ref()).canonicalize() {
                self.forbidden_paths.push(path);
            }
        }
        self
    }

    /// Check that an existing path is safe to edit.
    ///
    /// Returns the canonicalized absolute path if safe.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let canonical = self.absolute(path.as_ref()).canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    /// Check a path that may not exist yet (a file about to be created or a
    /// rename target).
    ///
    /// The nearest existing ancestor is canonicalized and the missing tail is
    /// appended to it. A `..` inside the missing part cannot be resolved and
    /// is rejected.
    pub fn validate_new_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let absolute = self.absolute(path.as_ref());
        if absolute.exists() {
            return self.validate_path(&absolute);
        }

        let mut tail = Vec::new();
        let mut ancestor = absolute.as_path();
        while !ancestor.exists() {
            let ends_in_parent_dir = matches!(
                ancestor.components().next_back(),
                Some(Component::ParentDir)
            );
            match (ancestor.file_name(), ancestor.parent()) {
                (Some(name), Some(parent)) if !ends_in_parent_dir => {
                    tail.push(name.to_os_string());
                    ancestor = parent;
                }
                _ => {
                    return Err(SafetyError::OutsideWorkspace {
                        path: absolute.clone(),
                        workspace: self.root.clone(),
                    })
                }
            }
        }

        let mut canonical = ancestor.canonicalize()?;
        for name in tail.iter().rev() {
            canonical.push(name);
        }
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical.to_path_buf(),
                workspace: self.root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_path_inside_workspace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path();
        let guard = WorkspaceGuard::new(workspace).unwrap();

        let file = workspace.join("src/main.rb");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        assert!(guard.validate_path(&file).is_ok());
    }

    #[test]
    fn test_validate_path_outside_workspace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();
        let guard = WorkspaceGuard::new(&workspace).unwrap();

        let outside = temp_dir.path().join("outside.rb");
        fs::write(&outside, b"").unwrap();

        let result = guard.validate_path(&outside);
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));
    }

    #[test]
    fn test_validate_path_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path();
        let vendor = workspace.join("vendor");
        fs::create_dir_all(&vendor).unwrap();

        let guard = WorkspaceGuard::new(workspace)
            .unwrap()
            .with_forbidden(["vendor"]);

        let file = vendor.join("gem/lib.rb");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        let result = guard.validate_path(&file);
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_git_dir_is_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path();
        fs::create_dir_all(workspace.join(".git")).unwrap();
        fs::write(workspace.join(".git/HEAD"), b"ref").unwrap();

        let guard = WorkspaceGuard::new(workspace).unwrap();
        let result = guard.validate_path(".git/HEAD");
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_validate_relative_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path();
        let guard = WorkspaceGuard::new(workspace).unwrap();

        fs::write(workspace.join("test.rb"), b"").unwrap();

        assert!(guard.validate_path("test.rb").is_ok());
    }

    #[test]
    fn test_validate_new_path_in_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path()).unwrap();

        let validated = guard.validate_new_path("app/models/user.rb").unwrap();
        assert!(validated.starts_with(guard.root()));
        assert!(validated.ends_with("app/models/user.rb"));
    }

    #[test]
    fn test_validate_new_path_rejects_parent_escape() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();
        let guard = WorkspaceGuard::new(&workspace).unwrap();

        let result = guard.validate_new_path("missing/../../escape.rb");
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));

        let result = guard.validate_new_path("../escape.rb");
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn test_validate_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();

        let outside = temp_dir.path().join("outside.rb");
        fs::write(&outside, b"").unwrap();

        let link = workspace.join("escape.rb");
        symlink(&outside, &link).unwrap();

        let guard = WorkspaceGuard::new(&workspace).unwrap();
        let result = guard.validate_path(&link);

        // Canonical path is outside the workspace
        assert!(matches!(result, Err(SafetyError::OutsideWorkspace { .. })));
    }
}
