use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// `end` value used by file-level edits to mean "the whole file".
pub const WHOLE_FILE: i64 = -1;

/// A pending edit produced by the analyzer.
///
/// Text edits (`Replace`, `Group`) carry character offsets into the
/// `current_text` of the [`EditSet`] they belong to. Children of a group use
/// the same absolute coordinates as their siblings; the group's own
/// `start`/`end` only bound them.
///
/// File-level edits (`AddFile`, `RemoveFile`, `RenameFile`) are never
/// spliced into text. They are applied as file-system operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Edit {
    Replace {
        start: usize,
        end: usize,
        #[serde(rename = "newCode")]
        new_text: String,
    },
    Group {
        start: usize,
        end: usize,
        #[serde(rename = "actions", default)]
        children: Vec<Edit>,
    },
    AddFile {
        #[serde(default)]
        start: usize,
        #[serde(default)]
        end: i64,
        #[serde(rename = "newCode", default)]
        new_text: String,
    },
    RemoveFile {
        #[serde(default)]
        start: usize,
        end: i64,
    },
    RenameFile {
        #[serde(default)]
        start: usize,
        end: i64,
    },
}

/// Discriminant of an [`Edit`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Replace,
    Group,
    AddFile,
    RemoveFile,
    RenameFile,
}

impl EditKind {
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            EditKind::AddFile | EditKind::RemoveFile | EditKind::RenameFile
        )
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditKind::Replace => "replace",
            EditKind::Group => "group",
            EditKind::AddFile => "add_file",
            EditKind::RemoveFile => "remove_file",
            EditKind::RenameFile => "rename_file",
        };
        f.write_str(name)
    }
}

impl Edit {
    /// Replace `[start, end)` with `new_text`.
    pub fn replace(start: usize, end: usize, new_text: impl Into<String>) -> Self {
        Edit::Replace {
            start,
            end,
            new_text: new_text.into(),
        }
    }

    /// Bundle `children` into a group bounded by their smallest start and
    /// largest end.
    pub fn group(children: Vec<Edit>) -> Self {
        let (start, end) = children
            .iter()
            .filter_map(Edit::span)
            .fold(None, |acc: Option<(usize, usize)>, (s, e)| match acc {
                Some((lo, hi)) => Some((lo.min(s), hi.max(e))),
                None => Some((s, e)),
            })
            .unwrap_or((0, 0));
        Edit::Group {
            start,
            end,
            children,
        }
    }

    pub fn add_file(new_text: impl Into<String>) -> Self {
        Edit::AddFile {
            start: 0,
            end: 0,
            new_text: new_text.into(),
        }
    }

    pub fn remove_file() -> Self {
        Edit::RemoveFile {
            start: 0,
            end: WHOLE_FILE,
        }
    }

    pub fn rename_file() -> Self {
        Edit::RenameFile {
            start: 0,
            end: WHOLE_FILE,
        }
    }

    pub fn kind(&self) -> EditKind {
        match self {
            Edit::Replace { .. } => EditKind::Replace,
            Edit::Group { .. } => EditKind::Group,
            Edit::AddFile { .. } => EditKind::AddFile,
            Edit::RemoveFile { .. } => EditKind::RemoveFile,
            Edit::RenameFile { .. } => EditKind::RenameFile,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.kind().is_structural()
    }

    /// Character span of a text edit. `None` for file-level edits.
    pub fn span(&self) -> Option<(usize, usize)> {
        match self {
            Edit::Replace { start, end, .. } | Edit::Group { start, end, .. } => {
                Some((*start, *end))
            }
            _ => None,
        }
    }

    /// Number of leaf edits below this edit (1 for anything but a group).
    pub fn leaf_count(&self) -> usize {
        match self {
            Edit::Group { children, .. } => children.iter().map(Edit::leaf_count).sum(),
            _ => 1,
        }
    }
}

/// Pending edits for one file, as handed over by the analyzer.
///
/// `affected` and `conflicted` belong to the analyzer and are carried through
/// every commit untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSet {
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_file_path: Option<PathBuf>,
    /// Text the offsets of `edits` refer to. Sets holding only file-level
    /// edits may omit it.
    #[serde(rename = "fileSource", default, skip_serializing_if = "Option::is_none")]
    pub current_text: Option<String>,
    #[serde(default)]
    pub affected: bool,
    #[serde(default)]
    pub conflicted: bool,
    #[serde(rename = "actions", default)]
    pub edits: Vec<Edit>,
}

impl EditSet {
    pub fn new(file_path: impl Into<PathBuf>, current_text: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            new_file_path: None,
            current_text: Some(current_text.into()),
            affected: false,
            conflicted: false,
            edits: Vec::new(),
        }
    }

    /// An edit set with no known source text, e.g. for a file about to be created.
    pub fn without_source(file_path: impl Into<PathBuf>) -> Self {
        Self {
            current_text: None,
            ..Self::new(file_path, String::new())
        }
    }

    pub fn with_edits(mut self, edits: Vec<Edit>) -> Self {
        self.edits = edits;
        self
    }

    pub fn with_new_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.new_file_path = Some(path.into());
        self
    }

    pub fn with_flags(mut self, affected: bool, conflicted: bool) -> Self {
        self.affected = affected;
        self.conflicted = conflicted;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn has_structural(&self) -> bool {
        self.edits.iter().any(Edit::is_structural)
    }
}

/// Violations of the analyzer's contract, detected before any I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("edits [{first_start}, {first_end}) and [{second_start}, {second_end}) overlap or are out of order")]
    Overlap {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },

    #[error("invalid range [{start}, {end}) in text of {len} characters")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    #[error("text edits require the file's source text, but none was provided")]
    MissingSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_bounds_cover_children() {
        let group = Edit::group(vec![Edit::replace(6, 11, "foo"), Edit::replace(0, 5, "hi")]);
        assert_eq!(group.span(), Some((0, 11)));
        assert_eq!(group.leaf_count(), 2);
    }

    #[test]
    fn test_empty_group_bounds() {
        assert_eq!(Edit::group(Vec::new()).span(), Some((0, 0)));
    }

    #[test]
    fn test_structural_kinds() {
        assert!(Edit::add_file("x").is_structural());
        assert!(Edit::remove_file().is_structural());
        assert!(Edit::rename_file().is_structural());
        assert!(!Edit::replace(0, 1, "x").is_structural());
        assert_eq!(Edit::rename_file().span(), None);
    }

    #[test]
    fn test_deserialize_analyzer_json() {
        let json = r#"{
            "filePath": "foo.ts",
            "fileSource": "hello world",
            "affected": true,
            "conflicted": false,
            "actions": [
                { "type": "replace", "start": 5, "end": 6, "newCode": "--" },
                { "type": "group", "start": 0, "end": 11, "actions": [
                    { "type": "replace", "start": 0, "end": 5, "newCode": "hi" },
                    { "type": "replace", "start": 6, "end": 11, "newCode": "foo" }
                ]}
            ]
        }"#;
        let set: EditSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.file_path, PathBuf::from("foo.ts"));
        assert_eq!(set.current_text.as_deref(), Some("hello world"));
        assert!(set.affected);
        assert_eq!(
            set.edits,
            vec![
                Edit::replace(5, 6, "--"),
                Edit::group(vec![Edit::replace(0, 5, "hi"), Edit::replace(6, 11, "foo")]),
            ]
        );
    }

    #[test]
    fn test_deserialize_structural_without_source() {
        let json = r#"{
            "filePath": "foo.ts",
            "newFilePath": "bar.ts",
            "affected": true,
            "conflicted": false,
            "actions": [{ "type": "rename_file", "start": 0, "end": -1 }]
        }"#;
        let set: EditSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.current_text, None);
        assert_eq!(set.new_file_path, Some(PathBuf::from("bar.ts")));
        assert_eq!(set.edits, vec![Edit::rename_file()]);
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let set = EditSet::new("a.rb", "x").with_edits(vec![Edit::replace(0, 1, "y")]);
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["filePath"], "a.rb");
        assert_eq!(value["fileSource"], "x");
        assert_eq!(value["actions"][0]["type"], "replace");
        assert_eq!(value["actions"][0]["newCode"], "y");
        assert!(value.get("newFilePath").is_none());
    }
}
