//! Freshness checks between an edit set and the file it was computed from.
//!
//! The commit engine trusts `current_text`. Callers that want to notice a
//! file changed behind the analyzer's back compare fingerprints first.

use crate::edit::EditSet;
use crate::fs::{FileSystem, FsError};
use std::fmt;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

/// xxh3 fingerprint of a text.
pub fn fingerprint(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Disk content matches the edit set's source text
    Fresh,
    /// Disk content differs from the source text
    Stale { expected: u64, found: u64 },
    /// The file does not exist on disk
    Missing,
    /// The edit set carries no source text to compare against
    Unknown,
}

impl SourceState {
    /// Whether committing text edits computed from this source is safe.
    pub fn is_committable(&self) -> bool {
        matches!(self, SourceState::Fresh | SourceState::Unknown)
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceState::Fresh => write!(f, "fresh"),
            SourceState::Stale { expected, found } => {
                write!(f, "stale (expected {expected:016x}, found {found:016x})")
            }
            SourceState::Missing => write!(f, "missing"),
            SourceState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Compare the file behind `set` with the set's source text.
pub fn check_source<F: FileSystem + ?Sized>(
    set: &EditSet,
    root: &Path,
    fs: &F,
) -> Result<SourceState, FsError> {
    let Some(source) = set.current_text.as_deref() else {
        return Ok(SourceState::Unknown);
    };

    let on_disk = match fs.read_file(&root.join(&set.file_path)) {
        Ok(text) => text,
        Err(e) if e.is_not_found() => return Ok(SourceState::Missing),
        Err(e) => return Err(e),
    };

    let expected = fingerprint(source);
    let found = fingerprint(&on_disk);
    if expected == found {
        Ok(SourceState::Fresh)
    } else {
        tracing::warn!(
            file = %set.file_path.display(),
            "file changed since the edits were computed"
        );
        Ok(SourceState::Stale { expected, found })
    }
}
