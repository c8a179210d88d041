//! The splice primitive: non-overlapping range replacements plus the offset
//! map from the old text into the new one.
//!
//! Offsets are character (Unicode scalar value) positions. Byte positions are
//! only computed internally while copying.

use crate::edit::EditError;

/// A single text replacement of `[start, end)` with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub start: usize,
    pub end: usize,
    pub new_text: String,
}

impl Leaf {
    pub fn new(start: usize, end: usize, new_text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            new_text: new_text.into(),
        }
    }

    /// Change in text length, in characters, caused by this leaf.
    pub fn delta(&self) -> isize {
        self.new_text.chars().count() as isize - (self.end as isize - self.start as isize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shift {
    start: usize,
    end: usize,
    delta: isize,
}

impl Shift {
    fn is_insertion(&self) -> bool {
        self.start == self.end
    }
}

/// Maps offsets of the pre-splice text to offsets of the spliced text.
///
/// Only offsets outside every spliced range have a meaningful image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remap {
    // Sorted by start; non-overlapping, so also sorted by end.
    shifts: Vec<Shift>,
}

impl Remap {
    /// Image of `p`: `p` plus the delta of every leaf ending at or before `p`.
    pub fn offset(&self, p: usize) -> usize {
        let delta: isize = self
            .shifts
            .iter()
            .take_while(|s| s.end <= p)
            .map(|s| s.delta)
            .sum();
        p.saturating_add_signed(delta)
    }

    /// Image of the range `[start, end)`.
    ///
    /// The start follows [`Remap::offset`]. The end ignores insertions sitting
    /// exactly on it, so text inserted at a range boundary lands outside the
    /// range. Empty ranges stay empty.
    pub fn range(&self, start: usize, end: usize) -> (usize, usize) {
        let new_start = self.offset(start);
        if start >= end {
            return (new_start, new_start);
        }
        let delta: isize = self
            .shifts
            .iter()
            .take_while(|s| s.end <= end)
            .filter(|s| !(s.is_insertion() && s.start == end))
            .map(|s| s.delta)
            .sum();
        (new_start, end.saturating_add_signed(delta))
    }

    /// Total change in text length.
    pub fn total_delta(&self) -> isize {
        self.shifts.iter().map(|s| s.delta).sum()
    }

    pub fn is_identity(&self) -> bool {
        self.shifts.iter().all(|s| s.delta == 0)
    }
}

/// Check that `leaves` are in ascending order, pairwise disjoint, and inside a
/// text of `len` characters.
pub fn check_leaves(leaves: &[Leaf], len: usize) -> Result<(), EditError> {
    for leaf in leaves {
        if leaf.start > leaf.end || leaf.end > len {
            return Err(EditError::OutOfBounds {
                start: leaf.start,
                end: leaf.end,
                len,
            });
        }
    }
    for pair in leaves.windows(2) {
        let (first, second) = (&pair[0], &pair[1]);
        if first.end > second.start {
            return Err(EditError::Overlap {
                first_start: first.start,
                first_end: first.end,
                second_start: second.start,
                second_end: second.end,
            });
        }
    }
    Ok(())
}

/// Walks a string forward, turning character offsets into byte offsets.
struct ByteCursor<'a> {
    text: &'a str,
    chars: usize,
    bytes: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: 0,
            bytes: 0,
        }
    }

    /// Byte offset of character `target`. Targets must not decrease.
    fn seek(&mut self, target: usize) -> usize {
        let skip = target.saturating_sub(self.chars);
        if skip > 0 {
            let rest = &self.text[self.bytes..];
            let advanced = rest
                .char_indices()
                .nth(skip)
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            self.bytes += advanced;
            self.chars = target;
        }
        self.bytes
    }
}

/// Replace every leaf's range in `text` with its `new_text`.
///
/// `leaves` must be sorted by `start` and non-overlapping; anything else is
/// rejected before the output is built.
pub fn splice(text: &str, leaves: &[Leaf]) -> Result<(String, Remap), EditError> {
    check_leaves(leaves, text.chars().count())?;

    let inserted: usize = leaves.iter().map(|l| l.new_text.len()).sum();
    let mut out = String::with_capacity(text.len() + inserted);
    let mut cursor = ByteCursor::new(text);
    let mut copied = 0;
    let mut shifts = Vec::with_capacity(leaves.len());

    for leaf in leaves {
        let start = cursor.seek(leaf.start);
        let end = cursor.seek(leaf.end);
        out.push_str(&text[copied..start]);
        out.push_str(&leaf.new_text);
        copied = end;
        shifts.push(Shift {
            start: leaf.start,
            end: leaf.end,
            delta: leaf.delta(),
        });
    }
    out.push_str(&text[copied..]);

    Ok((out, Remap { shifts }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice_single_leaf() {
        let (text, remap) = splice("hello world", &[Leaf::new(5, 6, "--")]).unwrap();
        assert_eq!(text, "hello--world");
        assert_eq!(remap.offset(0), 0);
        assert_eq!(remap.offset(5), 5);
        assert_eq!(remap.offset(6), 7);
        assert_eq!(remap.offset(11), 12);
        assert_eq!(remap.total_delta(), 1);
    }

    #[test]
    fn test_splice_multiple_leaves() {
        let leaves = [Leaf::new(0, 5, "hi"), Leaf::new(6, 11, "foo")];
        let (text, remap) = splice("hello world", &leaves).unwrap();
        assert_eq!(text, "hi foo");
        assert_eq!(remap.range(5, 6), (2, 3));
        assert_eq!(remap.offset(11), 6);
    }

    #[test]
    fn test_splice_no_leaves_is_identity() {
        let (text, remap) = splice("unchanged", &[]).unwrap();
        assert_eq!(text, "unchanged");
        assert!(remap.is_identity());
        assert_eq!(remap.offset(4), 4);
    }

    #[test]
    fn test_splice_counts_characters_not_bytes() {
        let (text, remap) = splice("héllo wörld", &[Leaf::new(6, 11, "welt")]).unwrap();
        assert_eq!(text, "héllo welt");
        assert_eq!(remap.offset(11), 10);

        let (text, _) = splice("日本語", &[Leaf::new(1, 2, "X")]).unwrap();
        assert_eq!(text, "日X語");
    }

    #[test]
    fn test_splice_insertion_and_deletion() {
        let leaves = [Leaf::new(0, 0, ">> "), Leaf::new(5, 11, "")];
        let (text, remap) = splice("hello world", &leaves).unwrap();
        assert_eq!(text, ">> hello");
        assert_eq!(remap.offset(0), 3);
        assert_eq!(remap.offset(11), 8);
    }

    #[test]
    fn test_range_keeps_boundary_insertion_outside() {
        let (_, remap) = splice("hello world", &[Leaf::new(5, 5, "!")]).unwrap();
        // Range ending at the insertion point does not grow.
        assert_eq!(remap.range(0, 5), (0, 5));
        // Range starting at the insertion point moves past it.
        assert_eq!(remap.range(5, 11), (6, 12));
        // Empty range at the same point moves past it as well.
        assert_eq!(remap.range(5, 5), (6, 6));
    }

    #[test]
    fn test_splice_rejects_overlap() {
        let leaves = [Leaf::new(0, 6, "a"), Leaf::new(5, 8, "b")];
        let err = splice("hello world", &leaves).unwrap_err();
        assert!(matches!(err, EditError::Overlap { .. }));
    }

    #[test]
    fn test_splice_rejects_unsorted() {
        let leaves = [Leaf::new(6, 11, "a"), Leaf::new(0, 5, "b")];
        let err = splice("hello world", &leaves).unwrap_err();
        assert!(matches!(err, EditError::Overlap { .. }));
    }

    #[test]
    fn test_splice_rejects_out_of_bounds() {
        let err = splice("short", &[Leaf::new(2, 9, "x")]).unwrap_err();
        assert_eq!(
            err,
            EditError::OutOfBounds {
                start: 2,
                end: 9,
                len: 5
            }
        );
    }

    #[test]
    fn test_splice_rejects_inverted_range() {
        let err = splice("hello", &[Leaf::new(4, 2, "x")]).unwrap_err();
        assert!(matches!(err, EditError::OutOfBounds { .. }));
    }

    #[test]
    fn test_adjacent_leaves_are_allowed() {
        let leaves = [Leaf::new(0, 5, "A"), Leaf::new(5, 6, "B"), Leaf::new(6, 6, "C")];
        let (text, _) = splice("hello world", &leaves).unwrap();
        assert_eq!(text, "ABCworld");
    }
}
