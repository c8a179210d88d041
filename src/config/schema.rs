use serde::Deserialize;
use std::fmt;
use std::path::{Component, PathBuf};

/// Settings read from `edit-committer.toml`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CommitConfig {
    /// Root that relative edit-set paths resolve against
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Bump the mtime of every written file
    #[serde(default = "default_true")]
    pub touch_mtime: bool,
    /// Refuse paths outside the root or inside forbidden directories
    #[serde(default = "default_true")]
    pub guard: bool,
    /// Extra forbidden directories, relative to the root
    #[serde(default)]
    pub forbidden: Vec<PathBuf>,
    /// Refuse to commit text edits when the file on disk differs from the
    /// edit set's source text
    #[serde(default)]
    pub check_source: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            root: None,
            touch_mtime: true,
            guard: true,
            forbidden: Vec::new(),
            check_source: false,
        }
    }
}

impl CommitConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if let Some(root) = &self.root {
            if root.as_os_str().is_empty() {
                issues.push(ValidationIssue::EmptyField { field: "root" });
            }
        }

        for entry in &self.forbidden {
            if entry.as_os_str().is_empty() {
                issues.push(ValidationIssue::EmptyField { field: "forbidden" });
            } else if entry.components().any(|c| matches!(c, Component::ParentDir)) {
                issues.push(ValidationIssue::ParentDirInForbidden {
                    entry: entry.clone(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyField { field: &'static str },
    ParentDirInForbidden { entry: PathBuf },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyField { field } => write!(f, "'{field}' must not be empty"),
            ValidationIssue::ParentDirInForbidden { entry } => write!(
                f,
                "forbidden entry '{}' must not contain '..'",
                entry.display()
            ),
        }
    }
}
