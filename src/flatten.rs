//! Expands edit trees into the ordered leaf lists the splice consumes.

use crate::edit::{Edit, EditError};
use crate::splice::Leaf;

/// Leaves of `edit` in tree order (a group yields its children's leaves, in
/// child order).
///
/// File-level edits cannot be spliced and are rejected wherever they appear.
pub fn flatten(edit: &Edit) -> Result<Vec<Leaf>, EditError> {
    let mut leaves = Vec::with_capacity(edit.leaf_count());
    collect(edit, &mut leaves)?;
    Ok(leaves)
}

fn collect(edit: &Edit, out: &mut Vec<Leaf>) -> Result<(), EditError> {
    match edit {
        Edit::Replace {
            start,
            end,
            new_text,
        } => {
            out.push(Leaf::new(*start, *end, new_text.clone()));
            Ok(())
        }
        Edit::Group { children, .. } => children.iter().try_for_each(|child| collect(child, out)),
        other => Err(EditError::StructuralMismatch(format!(
            "{} edit cannot be applied as a text edit",
            other.kind()
        ))),
    }
}

/// Leaves of a single top-level edit, ready for splicing.
pub fn flatten_one(edit: &Edit) -> Result<Vec<Leaf>, EditError> {
    order(flatten(edit)?)
}

/// Leaves of every edit in `edits`, ready for splicing.
pub fn flatten_all(edits: &[Edit]) -> Result<Vec<Leaf>, EditError> {
    let mut leaves = Vec::with_capacity(edits.iter().map(Edit::leaf_count).sum());
    for edit in edits {
        collect(edit, &mut leaves)?;
    }
    order(leaves)
}

/// Sort leaves by position and reject any pair that overlaps.
///
/// The sort is stable and keys on `(start, end)`, so an insertion sorts ahead
/// of a replacement starting at the same offset and equal insertions keep
/// their tree order.
fn order(mut leaves: Vec<Leaf>) -> Result<Vec<Leaf>, EditError> {
    leaves.sort_by_key(|leaf| (leaf.start, leaf.end));
    for pair in leaves.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(EditError::Overlap {
                first_start: pair[0].start,
                first_end: pair[0].end,
                second_start: pair[1].start,
                second_end: pair[1].end,
            });
        }
    }
    Ok(leaves)
}
