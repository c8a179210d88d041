//! Commit operations: turn pending edits into file changes.
//!
//! Every commit is computed in full before any I/O happens. The planners
//! ([`plan_all`], [`plan_one`]) are pure; the executors ([`commit_all`],
//! [`commit_one`]) run a plan against a [`FileSystem`]. The list-level entry
//! points ([`commit_edit_set`], [`commit_edit`]) return a new list and leave
//! the caller's list as it was when anything fails.

use crate::edit::{Edit, EditError, EditSet, WHOLE_FILE};
use crate::flatten::{flatten_all, flatten_one};
use crate::fs::{FileSystem, FsError};
use crate::splice::{splice, Remap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CommitError {
    #[error("cannot commit {file}: {source}")]
    Edit {
        file: PathBuf,
        #[source]
        source: EditError,
    },

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("no edit set at index {index} ({len} pending)")]
    NoSuchEditSet { index: usize, len: usize },

    #[error("no edit at index {index} in {file} ({len} pending)")]
    NoSuchEdit {
        file: PathBuf,
        index: usize,
        len: usize,
    },
}

impl CommitError {
    fn edit(set: &EditSet, source: EditError) -> Self {
        CommitError::Edit {
            file: set.file_path.clone(),
            source,
        }
    }

    /// The analyzer handed over edits that break its own guarantees.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, CommitError::Edit { .. })
    }
}

/// A single file-system effect. Paths are as recorded in the edit set and get
/// resolved against the root when executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOp {
    Write { path: PathBuf, text: String },
    Create { path: PathBuf, text: String },
    Remove { path: PathBuf },
    Rename { from: PathBuf, to: PathBuf },
}

impl FileOp {
    /// Path whose content changes.
    pub fn path(&self) -> &Path {
        match self {
            FileOp::Write { path, .. } | FileOp::Create { path, .. } | FileOp::Remove { path } => {
                path
            }
            FileOp::Rename { from, .. } => from,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            FileOp::Write { .. } => "write",
            FileOp::Create { .. } => "create",
            FileOp::Remove { .. } => "remove",
            FileOp::Rename { .. } => "rename",
        }
    }
}

/// Outcome of planning a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a Plan does nothing until it is executed"]
pub struct Plan {
    /// File effect, `None` when nothing needs to change on disk.
    pub op: Option<FileOp>,
    /// The edit set after the commit, `None` once it is fully consumed.
    pub remaining: Option<EditSet>,
}

/// Structural and text edits never share an edit set.
fn check_shape(set: &EditSet) -> Result<(), EditError> {
    let structural = set.edits.iter().filter(|e| e.is_structural()).count();
    if structural > 0 && structural < set.edits.len() {
        return Err(EditError::StructuralMismatch(format!(
            "{structural} file-level edit(s) mixed with {} text edit(s)",
            set.edits.len() - structural
        )));
    }
    Ok(())
}

fn structural_op(set: &EditSet, edit: &Edit) -> Result<FileOp, EditError> {
    match edit {
        Edit::AddFile { new_text, .. } => Ok(FileOp::Create {
            path: set.file_path.clone(),
            text: new_text.clone(),
        }),
        Edit::RemoveFile { end, .. } => {
            require_whole_file(edit, *end)?;
            Ok(FileOp::Remove {
                path: set.file_path.clone(),
            })
        }
        Edit::RenameFile { end, .. } => {
            require_whole_file(edit, *end)?;
            let to = set.new_file_path.clone().ok_or_else(|| {
                EditError::StructuralMismatch("rename_file edit without a new file path".into())
            })?;
            Ok(FileOp::Rename {
                from: set.file_path.clone(),
                to,
            })
        }
        other => Err(EditError::StructuralMismatch(format!(
            "{} is not a file-level edit",
            other.kind()
        ))),
    }
}

fn require_whole_file(edit: &Edit, end: i64) -> Result<(), EditError> {
    if end != WHOLE_FILE {
        return Err(EditError::StructuralMismatch(format!(
            "{} edit must span the whole file (end = {WHOLE_FILE}), got end = {end}",
            edit.kind()
        )));
    }
    Ok(())
}

fn source_text(set: &EditSet) -> Result<&str, EditError> {
    set.current_text.as_deref().ok_or(EditError::MissingSource)
}

/// Plan committing every pending edit of `set` at once.
///
/// The set is always fully consumed, so `remaining` is `None`. An empty set
/// plans no file operation at all.
pub fn plan_all(set: &EditSet) -> Result<Plan, CommitError> {
    let consumed = |op| Plan {
        op,
        remaining: None,
    };

    if set.edits.is_empty() {
        return Ok(consumed(None));
    }

    check_shape(set).map_err(|e| CommitError::edit(set, e))?;

    if set.has_structural() {
        if set.edits.len() > 1 {
            return Err(CommitError::edit(
                set,
                EditError::StructuralMismatch(format!(
                    "a file-level edit must be the only edit, found {}",
                    set.edits.len()
                )),
            ));
        }
        let op = structural_op(set, &set.edits[0]).map_err(|e| CommitError::edit(set, e))?;
        return Ok(consumed(Some(op)));
    }

    let text = source_text(set)
        .and_then(|source| {
            let leaves = flatten_all(&set.edits)?;
            debug!(
                file = %set.file_path.display(),
                leaves = leaves.len(),
                "splicing all pending edits"
            );
            splice(source, &leaves)
        })
        .map(|(text, _)| text)
        .map_err(|e| CommitError::edit(set, e))?;

    Ok(consumed(Some(FileOp::Write {
        path: set.file_path.clone(),
        text,
    })))
}

/// Plan committing the top-level edit at `index` of `set`.
///
/// For a text edit the remaining edits are remapped onto the new text. For a
/// file-level edit the remaining edits are kept as they are.
pub fn plan_one(set: &EditSet, index: usize) -> Result<Plan, CommitError> {
    let chosen = set.edits.get(index).ok_or_else(|| CommitError::NoSuchEdit {
        file: set.file_path.clone(),
        index,
        len: set.edits.len(),
    })?;

    check_shape(set).map_err(|e| CommitError::edit(set, e))?;

    let mut rest = set.clone();
    rest.edits.remove(index);

    if chosen.is_structural() {
        let op = structural_op(set, chosen).map_err(|e| CommitError::edit(set, e))?;
        if let FileOp::Rename { to, .. } = &op {
            rest.file_path = to.clone();
            rest.new_file_path = None;
        }
        return Ok(Plan {
            op: Some(op),
            remaining: (!rest.is_empty()).then_some(rest),
        });
    }

    let (text, remap) = source_text(set)
        .and_then(|source| {
            let leaves = flatten_one(chosen)?;
            debug!(
                file = %set.file_path.display(),
                index,
                leaves = leaves.len(),
                "splicing one pending edit"
            );
            splice(source, &leaves)
        })
        .map_err(|e| CommitError::edit(set, e))?;

    rest.edits = rest
        .edits
        .iter()
        .map(|edit| remap_edit(edit, &remap))
        .collect();
    rest.current_text = Some(text.clone());

    Ok(Plan {
        op: Some(FileOp::Write {
            path: set.file_path.clone(),
            text,
        }),
        remaining: (!rest.is_empty()).then_some(rest),
    })
}

/// Move `edit` (and everything nested in it) onto the spliced text.
pub fn remap_edit(edit: &Edit, remap: &Remap) -> Edit {
    match edit {
        Edit::Replace {
            start,
            end,
            new_text,
        } => {
            let (start, end) = remap.range(*start, *end);
            Edit::Replace {
                start,
                end,
                new_text: new_text.clone(),
            }
        }
        Edit::Group {
            start,
            end,
            children,
        } => {
            let (start, end) = remap.range(*start, *end);
            Edit::Group {
                start,
                end,
                children: children.iter().map(|c| remap_edit(c, remap)).collect(),
            }
        }
        structural => structural.clone(),
    }
}

/// Resolve `path` against `root` and perform `op`.
pub fn apply_op<F: FileSystem + ?Sized>(op: &FileOp, root: &Path, fs: &F) -> Result<(), FsError> {
    match op {
        FileOp::Write { path, text } | FileOp::Create { path, text } => {
            fs.write_file(&root.join(path), text)
        }
        FileOp::Remove { path } => fs.delete_file(&root.join(path)),
        FileOp::Rename { from, to } => fs.rename_file(&root.join(from), &root.join(to)),
    }
}

fn execute<F: FileSystem + ?Sized>(plan: &Plan, root: &Path, fs: &F) -> Result<(), CommitError> {
    if let Some(op) = &plan.op {
        apply_op(op, root, fs)?;
        info!(
            op = op.describe(),
            file = %op.path().display(),
            "committed"
        );
    }
    Ok(())
}

/// Commit every pending edit of `set`. The set is consumed afterwards.
pub fn commit_all<F: FileSystem + ?Sized>(
    set: &EditSet,
    root: &Path,
    fs: &F,
) -> Result<(), CommitError> {
    let plan = plan_all(set)?;
    execute(&plan, root, fs)
}

/// Commit the top-level edit at `index` of `set`.
///
/// Returns the updated set, or `None` once nothing is left pending.
pub fn commit_one<F: FileSystem + ?Sized>(
    set: &EditSet,
    index: usize,
    root: &Path,
    fs: &F,
) -> Result<Option<EditSet>, CommitError> {
    let plan = plan_one(set, index)?;
    execute(&plan, root, fs)?;
    Ok(plan.remaining)
}

fn edit_set_at(sets: &[EditSet], index: usize) -> Result<&EditSet, CommitError> {
    sets.get(index).ok_or(CommitError::NoSuchEditSet {
        index,
        len: sets.len(),
    })
}

/// Commit everything pending for the edit set at `set_index`.
///
/// Returns `sets` without that edit set.
pub fn commit_edit_set<F: FileSystem + ?Sized>(
    sets: &[EditSet],
    set_index: usize,
    root: &Path,
    fs: &F,
) -> Result<Vec<EditSet>, CommitError> {
    commit_all(edit_set_at(sets, set_index)?, root, fs)?;

    let mut updated = sets.to_vec();
    updated.remove(set_index);
    Ok(updated)
}

/// Commit top-level edit `edit_index` of the edit set at `set_index`.
///
/// Returns `sets` with that edit set replaced by its remainder, or without it
/// once it is fully consumed.
pub fn commit_edit<F: FileSystem + ?Sized>(
    sets: &[EditSet],
    set_index: usize,
    edit_index: usize,
    root: &Path,
    fs: &F,
) -> Result<Vec<EditSet>, CommitError> {
    let remaining = commit_one(edit_set_at(sets, set_index)?, edit_index, root, fs)?;

    let mut updated = sets.to_vec();
    match remaining {
        Some(set) => updated[set_index] = set,
        None => {
            updated.remove(set_index);
        }
    }
    Ok(updated)
}
