//! Cursors, ranges and multi-cursor selection sets.
//!
//! A [`Selection`] is a value: `start <= end` always holds and `reversed`
//! remembers that the anchor sat at `end`. A [`SelectionSet`] is what a view
//! publishes. It is sorted, has no overlapping (or touching) members and,
//! unless empty, exactly one primary selection.
//!
//! Edit builders hand selections to the batch applier as
//! [`TrackedSelection`]s, which carry the tie-break used when a boundary sits
//! exactly on an insertion point.

use ropey::RopeSlice;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
  position::{
    Position,
    char_idx_at_position,
    position_at_char_idx,
  },
  transaction::{
    Assoc,
    ChangeSet,
    TransactionError,
  },
};

pub type Result<T> = std::result::Result<T, SelectionError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
  #[error("selection index {index} out of bounds for selection set of length {len}")]
  IndexOutOfBounds { index: usize, len: usize },
  #[error(transparent)]
  Transaction(#[from] TransactionError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
  pub start:    Position,
  pub end:      Position,
  pub primary:  bool,
  pub reversed: bool,
}

impl Selection {
  /// A selection from `anchor` to `head`, in either order.
  pub fn new(anchor: Position, head: Position) -> Self {
    if head < anchor {
      Self {
        start:    head,
        end:      anchor,
        primary:  false,
        reversed: true,
      }
    } else {
      Self {
        start:    anchor,
        end:      head,
        primary:  false,
        reversed: false,
      }
    }
  }

  pub fn cursor(pos: Position) -> Self {
    Self::new(pos, pos)
  }

  pub fn with_primary(mut self, primary: bool) -> Self {
    self.primary = primary;
    self
  }

  pub fn anchor(&self) -> Position {
    if self.reversed { self.end } else { self.start }
  }

  pub fn head(&self) -> Position {
    if self.reversed { self.start } else { self.end }
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.start == self.end
  }

  #[inline]
  pub fn is_multi_line(&self) -> bool {
    self.start.line != self.end.line
  }

  /// `pos` lies within `[start, end)`, or within `[start, end]` when
  /// `end_inclusive` is set.
  pub fn contains(&self, pos: Position, end_inclusive: bool) -> bool {
    self.start <= pos && (pos < self.end || (end_inclusive && pos == self.end))
  }

  /// Rebuilds the selection from two new boundaries, keeping its direction
  /// and primary flag.
  pub fn with_bounds(self, start: Position, end: Position) -> Self {
    let (start, end) = if end < start { (end, start) } else { (start, end) };
    Self { start, end, ..self }
  }
}

/// A selection handed to the batch applier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackedSelection {
  pub selection:      Selection,
  /// Boundaries sitting exactly on an insertion point stay before the
  /// inserted text instead of being pushed past it.
  pub is_before_edit: bool,
  /// The selection is already expressed in the coordinates produced by its
  /// own entry's edits; only the other entries' edits still move it.
  pub pre_adjusted:   bool,
}

impl TrackedSelection {
  pub fn new(selection: Selection) -> Self {
    Self {
      selection,
      is_before_edit: false,
      pre_adjusted: false,
    }
  }

  pub fn before_edit(selection: Selection) -> Self {
    Self {
      is_before_edit: true,
      ..Self::new(selection)
    }
  }

  pub fn pre_adjusted(selection: Selection) -> Self {
    Self {
      pre_adjusted: true,
      ..Self::new(selection)
    }
  }

  pub(crate) fn assoc(&self) -> Assoc {
    if self.is_before_edit {
      Assoc::Before
    } else {
      Assoc::After
    }
  }
}

impl From<Selection> for TrackedSelection {
  fn from(selection: Selection) -> Self {
    Self::new(selection)
  }
}

/// The normalized selection state of a view.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectionSet {
  ranges: SmallVec<[Selection; 1]>,
}

impl SelectionSet {
  /// Sorts, merges overlapping or touching selections and settles on a single
  /// primary. When nothing is flagged primary the last selection is.
  pub fn new(selections: impl IntoIterator<Item = Selection>) -> Self {
    let mut ranges: SmallVec<[Selection; 1]> = selections.into_iter().collect();
    if ranges.is_empty() {
      return Self { ranges };
    }

    let primary_idx = ranges
      .iter()
      .position(|sel| sel.primary)
      .unwrap_or(ranges.len() - 1);
    for (idx, sel) in ranges.iter_mut().enumerate() {
      sel.primary = idx == primary_idx;
    }

    ranges.sort_by_key(|sel| sel.start);

    let mut merged: SmallVec<[Selection; 1]> = SmallVec::with_capacity(ranges.len());
    for sel in ranges {
      if let Some(prev) = merged.last_mut() {
        if prev.end >= sel.start {
          let end = prev.end.max(sel.end);
          let primary = prev.primary || sel.primary;
          let reversed = if sel.primary { sel.reversed } else { prev.reversed };
          *prev = Selection {
            start: prev.start,
            end,
            primary,
            reversed,
          };
          continue;
        }
      }
      merged.push(sel);
    }

    Self { ranges: merged }
  }

  pub fn single(selection: Selection) -> Self {
    Self::new([selection.with_primary(true)])
  }

  pub fn empty() -> Self {
    Self::default()
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.ranges.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.ranges.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Selection> {
    self.ranges.iter()
  }

  pub fn as_slice(&self) -> &[Selection] {
    &self.ranges
  }

  pub fn primary(&self) -> Option<&Selection> {
    self.ranges.iter().find(|sel| sel.primary)
  }

  pub fn primary_index(&self) -> Option<usize> {
    self.ranges.iter().position(|sel| sel.primary)
  }

  pub fn set_primary(&mut self, index: usize) -> Result<()> {
    let len = self.ranges.len();
    if index >= len {
      return Err(SelectionError::IndexOutOfBounds { index, len });
    }
    for (idx, sel) in self.ranges.iter_mut().enumerate() {
      sel.primary = idx == index;
    }
    Ok(())
  }

  /// Moves every selection through `changes`, the way the buffer shifts
  /// selections nobody tracked explicitly: boundaries on an insertion point
  /// move past the inserted text.
  pub fn map(&self, changes: &ChangeSet, before: RopeSlice, after: RopeSlice) -> Result<Self> {
    let mapped = map_selections(self.ranges.iter().copied(), changes, before, after, |_| {
      Assoc::After
    })?;
    Ok(Self::new(mapped))
  }
}

impl<'a> IntoIterator for &'a SelectionSet {
  type IntoIter = std::slice::Iter<'a, Selection>;
  type Item = &'a Selection;

  fn into_iter(self) -> Self::IntoIter {
    self.ranges.iter()
  }
}

/// Maps selections from `before` coordinates to `after` coordinates.
pub(crate) fn map_selections(
  selections: impl IntoIterator<Item = Selection>,
  changes: &ChangeSet,
  before: RopeSlice,
  after: RopeSlice,
  assoc: impl Fn(&Selection) -> Assoc,
) -> Result<Vec<Selection>> {
  selections
    .into_iter()
    .map(|sel| {
      let assoc = assoc(&sel);
      let start = changes.map_pos(char_idx_at_position(before, sel.start), assoc)?;
      let end = changes.map_pos(char_idx_at_position(before, sel.end), assoc)?;
      Ok(sel.with_bounds(
        position_at_char_idx(after, start),
        position_at_char_idx(after, end),
      ))
    })
    .collect()
}

#[cfg(test)]
mod test {
  use super::*;

  fn pos(line: usize, ch: usize) -> Position {
    Position::new(line, ch)
  }

  #[test]
  fn new_orders_bounds() {
    let sel = Selection::new(pos(2, 0), pos(1, 4));
    assert_eq!(sel.start, pos(1, 4));
    assert_eq!(sel.end, pos(2, 0));
    assert!(sel.reversed);
    assert_eq!(sel.anchor(), pos(2, 0));
    assert_eq!(sel.head(), pos(1, 4));

    let cursor = Selection::cursor(pos(0, 3));
    assert!(cursor.is_empty());
    assert!(!cursor.reversed);
  }

  #[test]
  fn contains_respects_inclusive_end() {
    let sel = Selection::new(pos(0, 0), pos(1, 0));
    assert!(sel.contains(pos(0, 5), false));
    assert!(!sel.contains(pos(1, 0), false));
    assert!(sel.contains(pos(1, 0), true));
  }

  mod set {
    use super::*;

    #[test]
    fn last_is_primary_by_default() {
      let set = SelectionSet::new([
        Selection::cursor(pos(3, 0)),
        Selection::cursor(pos(1, 0)),
      ]);
      assert_eq!(set.len(), 2);
      assert_eq!(set.as_slice()[0].start, pos(1, 0));
      assert_eq!(set.primary().map(|sel| sel.start), Some(pos(1, 0)));
    }

    #[test]
    fn merges_touching_and_duplicates() {
      let set = SelectionSet::new([
        Selection::new(pos(0, 0), pos(0, 4)),
        Selection::cursor(pos(0, 4)).with_primary(true),
        Selection::cursor(pos(2, 1)),
        Selection::cursor(pos(2, 1)),
      ]);
      assert_eq!(set.len(), 2);
      assert_eq!(set.as_slice()[0].end, pos(0, 4));
      assert!(set.as_slice()[0].primary);
      assert!(!set.as_slice()[1].primary);
    }

    #[test]
    fn empty_has_no_primary() {
      let set = SelectionSet::new([]);
      assert!(set.is_empty());
      assert!(set.primary().is_none());
    }

    #[test]
    fn set_primary_bounds() {
      let mut set = SelectionSet::new([
        Selection::cursor(pos(0, 0)),
        Selection::cursor(pos(1, 0)),
      ]);
      set.set_primary(0).unwrap();
      assert_eq!(set.primary_index(), Some(0));
      assert_eq!(
        set.set_primary(5),
        Err(SelectionError::IndexOutOfBounds { index: 5, len: 2 })
      );
    }
  }
}
