//! Reading and writing the analyzer's list of edit sets (a JSON array).

use crate::edit::EditSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read edit sets from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write edit sets to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid edit set JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid edit set JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

pub fn from_str(input: &str) -> Result<Vec<EditSet>, StoreError> {
    Ok(serde_json::from_str(input)?)
}

pub fn to_string(sets: &[EditSet]) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(sets)?)
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<EditSet>, StoreError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `sets` back to `path`, replacing the file atomically.
pub fn save(path: impl AsRef<Path>, sets: &[EditSet]) -> Result<(), StoreError> {
    let path = path.as_ref();
    let mut json = to_string(sets)?;
    json.push('\n');

    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(json.as_bytes()).map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
