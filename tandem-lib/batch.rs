//! Edit batches: every edit of one command, plus every selection that has to
//! survive it, applied in a single pass.
//!
//! All descriptor positions of a batch are expressed against the buffer as it
//! was before the batch, whichever entry or group they belong to. The applier
//! resolves them, sorts them into document order, refuses overlapping edits
//! before touching anything and turns the whole batch into one
//! [`ChangeSet`]. Tracked selections are then carried through that change set:
//!
//! - a regular tracked selection is mapped through every edit, and a boundary
//!   sitting exactly on an insertion point is pushed past the inserted text
//!   unless it is marked `is_before_edit`;
//! - a `pre_adjusted` selection already accounts for the edits of its own
//!   entry, so it is only moved by the edits of the other entries.
//!
//! Final selections come back in submission order.

use ropey::Rope;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
  Tendril,
  position::{
    Position,
    char_idx_at_position,
    position_at_char_idx,
  },
  selection::{
    Selection,
    SelectionError,
    TrackedSelection,
  },
  transaction::{
    ChangeSet,
    TransactionError,
  },
};

pub type Result<T> = std::result::Result<T, BatchError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BatchError {
  #[error("edit ends at {end} before it starts at {start}")]
  InvalidRange { start: Position, end: Position },
  #[error("overlapping edits at {first} and {second}")]
  OverlappingEdits { first: Position, second: Position },
  #[error(transparent)]
  Transaction(#[from] TransactionError),
  #[error(transparent)]
  Selection(#[from] SelectionError),
}

/// One range replacement. A missing `end` is a pure insertion at `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDescriptor {
  pub text:  Tendril,
  pub start: Position,
  pub end:   Option<Position>,
}

impl EditDescriptor {
  pub fn insert(text: impl Into<Tendril>, at: Position) -> Self {
    Self {
      text:  text.into(),
      start: at,
      end:   None,
    }
  }

  pub fn replace(text: impl Into<Tendril>, start: Position, end: Position) -> Self {
    Self {
      text: text.into(),
      start,
      end: Some(end),
    }
  }

  pub fn delete(start: Position, end: Position) -> Self {
    Self::replace("", start, end)
  }

  pub fn end(&self) -> Position {
    self.end.unwrap_or(self.start)
  }
}

/// An edit group plus the selections riding along with it. An entry without
/// edits just carries its selections through the rest of the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchEntry {
  pub edits:      SmallVec<[EditDescriptor; 2]>,
  pub selections: SmallVec<[TrackedSelection; 1]>,
}

impl BatchEntry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn pass_through(selections: impl IntoIterator<Item = TrackedSelection>) -> Self {
    Self {
      edits:      SmallVec::new(),
      selections: selections.into_iter().collect(),
    }
  }

  pub fn with_edit(mut self, edit: EditDescriptor) -> Self {
    self.edits.push(edit);
    self
  }

  pub fn with_edits(mut self, edits: impl IntoIterator<Item = EditDescriptor>) -> Self {
    self.edits.extend(edits);
    self
  }

  pub fn track(mut self, selection: TrackedSelection) -> Self {
    self.selections.push(selection);
    self
  }

  pub fn track_all(mut self, selections: impl IntoIterator<Item = TrackedSelection>) -> Self {
    self.selections.extend(selections);
    self
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBatch {
  entries: Vec<BatchEntry>,
}

impl EditBatch {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, entry: BatchEntry) {
    self.entries.push(entry);
  }

  pub fn entries(&self) -> &[BatchEntry] {
    &self.entries
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Whether applying the batch would change any text.
  pub fn has_edits(&self) -> bool {
    self
      .entries
      .iter()
      .flat_map(|entry| &entry.edits)
      .any(|edit| !edit.text.is_empty() || edit.end() > edit.start)
  }

  pub fn tracks_selections(&self) -> bool {
    self.entries.iter().any(|entry| !entry.selections.is_empty())
  }
}

impl FromIterator<BatchEntry> for EditBatch {
  fn from_iter<I: IntoIterator<Item = BatchEntry>>(iter: I) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}

/// What applying a batch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
  pub changes:    ChangeSet,
  /// Every tracked selection, flattened, in submission order.
  pub selections: Vec<Selection>,
}

#[derive(Debug)]
struct ResolvedEdit {
  from:  usize,
  to:    usize,
  text:  Tendril,
  entry: usize,
}

/// Computes the change set and final selections for `batch` against `text`
/// without mutating it. Fails before anything is applied when the batch is
/// malformed.
pub fn resolve_batch(text: &Rope, batch: &EditBatch) -> Result<BatchOutcome> {
  let slice = text.slice(..);

  let mut edits = Vec::new();
  let mut starts = Vec::new();
  for (entry, batch_entry) in batch.entries.iter().enumerate() {
    for edit in &batch_entry.edits {
      let end = edit.end();
      if end < edit.start {
        return Err(BatchError::InvalidRange {
          start: edit.start,
          end,
        });
      }
      let from = char_idx_at_position(slice, edit.start);
      let to = char_idx_at_position(slice, end);
      starts.push(edit.start);
      edits.push(ResolvedEdit {
        from,
        to,
        text: edit.text.clone(),
        entry,
      });
    }
  }

  // Stable, so insertions sharing a point keep their submission order.
  let mut order: Vec<usize> = (0..edits.len()).collect();
  order.sort_by_key(|&idx| (edits[idx].from, edits[idx].to));
  for pair in order.windows(2) {
    let (prev, next) = (&edits[pair[0]], &edits[pair[1]]);
    if next.from < prev.to {
      tracing::warn!(first = %starts[pair[0]], second = %starts[pair[1]], "refusing overlapping edits");
      return Err(BatchError::OverlappingEdits {
        first:  starts[pair[0]],
        second: starts[pair[1]],
      });
    }
  }
  let edits: Vec<ResolvedEdit> = {
    let mut slots: Vec<Option<ResolvedEdit>> = edits.into_iter().map(Some).collect();
    order.iter().filter_map(|&idx| slots[idx].take()).collect()
  };

  let changes = ChangeSet::change(
    text,
    edits
      .iter()
      .map(|edit| (edit.from, edit.to, Some(edit.text.clone()))),
  )?;
  let after = changes.apply_to(text)?;
  let after_slice = after.slice(..);

  let mut selections = Vec::new();
  for (entry, batch_entry) in batch.entries.iter().enumerate() {
    if batch_entry.selections.is_empty() {
      continue;
    }

    let mut own: Option<(Rope, ChangeSet)> = None;
    for tracked in &batch_entry.selections {
      let sel = tracked.selection;
      let assoc = tracked.assoc();
      let (start, end) = if tracked.pre_adjusted {
        if own.is_none() {
          own = Some(rebase_others(text, &edits, entry)?);
        }
        let Some((own_text, others)) = own.as_ref() else {
          continue;
        };
        let own_slice = own_text.slice(..);
        (
          others.map_pos(char_idx_at_position(own_slice, sel.start), assoc)?,
          others.map_pos(char_idx_at_position(own_slice, sel.end), assoc)?,
        )
      } else {
        (
          changes.map_pos(char_idx_at_position(slice, sel.start), assoc)?,
          changes.map_pos(char_idx_at_position(slice, sel.end), assoc)?,
        )
      };
      selections.push(sel.with_bounds(
        position_at_char_idx(after_slice, start),
        position_at_char_idx(after_slice, end),
      ));
    }
  }

  tracing::trace!(
    edits = edits.len(),
    selections = selections.len(),
    "resolved edit batch"
  );

  Ok(BatchOutcome {
    changes,
    selections,
  })
}

/// The buffer after only `entry`'s edits, and the remaining edits expressed
/// against it.
fn rebase_others(text: &Rope, edits: &[ResolvedEdit], entry: usize) -> Result<(Rope, ChangeSet)> {
  let own = ChangeSet::change(
    text,
    edits
      .iter()
      .filter(|edit| edit.entry == entry)
      .map(|edit| (edit.from, edit.to, Some(edit.text.clone()))),
  )?;
  let own_text = own.apply_to(text)?;

  let mut delta = 0isize;
  let mut others = Vec::new();
  for edit in edits {
    if edit.entry == entry {
      delta += edit.text.chars().count() as isize - (edit.to - edit.from) as isize;
    } else {
      others.push((
        edit.from.saturating_add_signed(delta),
        edit.to.saturating_add_signed(delta),
        Some(edit.text.clone()),
      ));
    }
  }
  let others = ChangeSet::change(&own_text, others)?;
  Ok((own_text, others))
}
