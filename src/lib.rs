//! Edit Committer: applies analyzer-produced range edits to source files
//!
//! An analyzer hands over one [`EditSet`] per file: the file's current text
//! and a tree of pending [`Edit`]s (single replacements, or groups of them that
//! belong together). This crate commits them to disk, either all at once or
//! one top-level edit at a time.
//!
//! # Architecture
//!
//! Everything is built on one primitive, [`splice`]: non-overlapping character
//! ranges replaced in a single pass, returning the new text together with a
//! [`Remap`] from old offsets to new ones. [`flatten`] turns edit trees into
//! the ordered leaf lists the splice consumes. The [`commit`] module plans a
//! commit without side effects and then runs it against a [`FileSystem`].
//!
//! Committing a single edit remaps every edit still pending, including edits
//! nested inside groups, so they stay valid against the new text.
//!
//! # Safety
//!
//! - Overlapping or out-of-range edits are rejected before any I/O
//! - File-level edits (add/remove/rename) never mix with text edits
//! - Atomic file writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//! - On failure the caller's edit sets are left untouched
//!
//! # Example
//!
//! ```no_run
//! use edit_committer::{commit_edit, DiskFs, Edit, EditSet};
//! use std::path::Path;
//!
//! let sets = vec![EditSet::new("src/greeting.rb", "hello world").with_edits(vec![
//!     Edit::replace(0, 5, "hi"),
//!     Edit::replace(6, 11, "there"),
//! ])];
//!
//! // Commit only the first edit; the second moves to [3, 8).
//! let sets = commit_edit(&sets, 0, 0, Path::new("."), &DiskFs::new())?;
//! assert_eq!(sets[0].edits, vec![Edit::replace(3, 8, "there")]);
//! # Ok::<(), edit_committer::CommitError>(())
//! ```

pub mod commit;
pub mod config;
pub mod edit;
pub mod flatten;
pub mod fs;
pub mod safety;
pub mod splice;
pub mod store;
pub mod verify;

// Re-exports
pub use commit::{
    apply_op, commit_all, commit_edit, commit_edit_set, commit_one, plan_all, plan_one,
    remap_edit, CommitError, FileOp, Plan,
};
pub use config::{CommitConfig, ConfigError};
pub use edit::{Edit, EditError, EditKind, EditSet, WHOLE_FILE};
pub use flatten::{flatten, flatten_all, flatten_one};
pub use fs::{DiskFs, FileSystem, FsError, FsOp, MemoryFs};
pub use safety::{SafetyError, WorkspaceGuard};
pub use splice::{splice, Leaf, Remap};
pub use store::StoreError;
pub use verify::{check_source, fingerprint, SourceState};
