//! The line span an inline view is restricted to.
//!
//! The span follows the buffer through every change. A change that crosses
//! one of its edges (the start of the first line, or the terminator of the
//! last one) makes the span unresolvable: undoing such a change would look
//! like text added outside the span, so the span is dropped instead of being
//! fixed up wrongly.

use std::{
  cell::RefCell,
  rc::Rc,
};

use smallvec::SmallVec;

use crate::{
  document::{
    ChangeRecord,
    Document,
    DocumentHandle,
    DocumentId,
  },
  lines::LineBounds,
};

/// What a batch of change records did to a [`VisibleRange`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RangeUpdate {
  /// The span moved or grew.
  pub changed:         bool,
  /// Text inside the span changed.
  pub content_changed: bool,
  pub lost_sync:       bool,
}

#[derive(Debug)]
pub struct VisibleRange {
  handle: DocumentHandle,
  lines:  Option<(usize, usize)>,
}

impl VisibleRange {
  pub fn new(doc: &Rc<RefCell<Document>>, start_line: usize, end_line: usize) -> Self {
    let (start_line, end_line) = if end_line < start_line {
      (end_line, start_line)
    } else {
      (start_line, end_line)
    };
    Self {
      handle: DocumentHandle::acquire(doc),
      lines:  Some((start_line, end_line)),
    }
  }

  pub fn document(&self) -> DocumentId {
    self.handle.id()
  }

  pub fn start_line(&self) -> Option<usize> {
    self.lines.map(|(start, _)| start)
  }

  pub fn end_line(&self) -> Option<usize> {
    self.lines.map(|(_, end)| end)
  }

  pub fn bounds(&self) -> Option<LineBounds> {
    self.lines.map(|(start, end)| LineBounds::new(start, end))
  }

  pub fn is_lost(&self) -> bool {
    self.lines.is_none()
  }

  /// Forgets the span, e.g. because its buffer went away.
  pub fn lose_sync(&mut self) {
    self.lines = None;
  }

  /// Replays `records` (in the order they were applied) onto the span.
  pub fn apply_records(&mut self, records: &[ChangeRecord]) -> RangeUpdate {
    let mut update = RangeUpdate::default();
    for record in records {
      let Some((start, end)) = self.lines else {
        break;
      };
      match apply_record(start, end, record) {
        Some((new_start, new_end, content_changed)) => {
          update.changed |= (new_start, new_end) != (start, end);
          update.content_changed |= content_changed;
          self.lines = Some((new_start, new_end));
        },
        None => {
          tracing::warn!(
            document = ?self.handle.id(),
            start,
            end,
            from = %record.from,
            to = %record.to,
            "visible range lost sync"
          );
          self.lines = None;
          update.changed = true;
          update.content_changed = true;
          update.lost_sync = true;
        },
      }
    }
    update
  }

  /// Lines outside the span, as inclusive `(first, last)` runs.
  pub fn hidden_lines(&self, line_count: usize) -> SmallVec<[(usize, usize); 2]> {
    let mut hidden = SmallVec::new();
    let Some((start, end)) = self.lines else {
      return hidden;
    };
    if start > 0 {
      hidden.push((0, start - 1));
    }
    if end + 1 < line_count {
      hidden.push((end + 1, line_count - 1));
    }
    hidden
  }

  /// Releases the buffer reference held by the span.
  pub fn dispose(self) {
    tracing::debug!(document = ?self.handle.id(), "disposing visible range");
  }
}

/// The span after one record, and whether its content changed. `None` when
/// the record crosses an edge.
fn apply_record(start: usize, end: usize, record: &ChangeRecord) -> Option<(usize, usize, bool)> {
  let (from, to) = (record.from.line, record.to.line);
  if (from < start && to >= start) || (from <= end && to > end) {
    return None;
  }

  let added = record.lines_added();
  let (mut start, mut end) = (start, end);
  if added != 0 {
    if to < start {
      start = start.saturating_add_signed(added);
    }
    if to <= end {
      end = end.saturating_add_signed(added);
    }
  }
  let content_changed = from >= start && from <= end;
  Some((start, end, content_changed))
}

#[cfg(test)]
mod test {
  use std::num::NonZeroUsize;

  use super::*;
  use crate::position::Position;

  fn shared(text: &str) -> Rc<RefCell<Document>> {
    let id = DocumentId::new(NonZeroUsize::new(1).unwrap());
    Rc::new(RefCell::new(Document::new(id, text, "plain")))
  }

  fn record(from: (usize, usize), to: (usize, usize), text: &[&str]) -> ChangeRecord {
    ChangeRecord {
      from: Position::new(from.0, from.1),
      to:   Position::new(to.0, to.1),
      text: text.iter().map(|line| line.to_string()).collect(),
    }
  }

  #[test]
  fn follows_lines_added_above() {
    let doc = shared("a\nb\nc\nd");
    let mut range = VisibleRange::new(&doc, 1, 2);
    let update = range.apply_records(&[record((0, 0), (0, 0), &["x", ""])]);
    assert_eq!(range.bounds(), Some(LineBounds::new(2, 3)));
    assert!(update.changed);
    assert!(!update.content_changed);
  }

  #[test]
  fn grows_with_content() {
    let doc = shared("a\nb\nc\nd");
    let mut range = VisibleRange::new(&doc, 1, 2);
    let update = range.apply_records(&[record((1, 1), (1, 1), &["", "x"])]);
    assert_eq!(range.bounds(), Some(LineBounds::new(1, 3)));
    assert!(update.content_changed);

    let update = range.apply_records(&[record((3, 0), (3, 1), &[""])]);
    assert_eq!(range.bounds(), Some(LineBounds::new(1, 3)));
    assert!(!update.changed);
    assert!(update.content_changed);
  }

  #[test]
  fn changes_below_are_ignored() {
    let doc = shared("a\nb\nc\nd");
    let mut range = VisibleRange::new(&doc, 0, 1);
    let update = range.apply_records(&[record((3, 0), (3, 1), &["x", "y"])]);
    assert_eq!(update, RangeUpdate::default());
  }

  #[test]
  fn crossing_an_edge_loses_sync() {
    let doc = shared("a\nb\nc\nd");
    let mut range = VisibleRange::new(&doc, 1, 2);
    let update = range.apply_records(&[record((0, 1), (1, 0), &[""])]);
    assert!(update.lost_sync);
    assert!(range.is_lost());

    let mut range = VisibleRange::new(&doc, 1, 2);
    range.apply_records(&[record((2, 1), (3, 0), &[""])]);
    assert!(range.is_lost());
    assert!(range.hidden_lines(4).is_empty());
  }

  #[test]
  fn hidden_runs() {
    let doc = shared("a\nb\nc\nd\ne");
    let range = VisibleRange::new(&doc, 1, 2);
    assert_eq!(range.hidden_lines(5).as_slice(), &[(0, 0), (3, 4)]);
    let range = VisibleRange::new(&doc, 0, 4);
    assert!(range.hidden_lines(5).is_empty());
  }

  #[test]
  fn holds_a_reference() {
    let doc = shared("a");
    let range = VisibleRange::new(&doc, 0, 0);
    assert_eq!(doc.borrow().ref_count(), 1);
    range.dispose();
    assert_eq!(doc.borrow().ref_count(), 0);
  }
}
