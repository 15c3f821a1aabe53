//! Whole-line commands: moving, duplicating, deleting and opening lines, and
//! the selection-only line commands.
//!
//! Builders that track selections return batches whose every selection is
//! tracked. Builders whose edits already move selections correctly (moving
//! down, duplicating, deleting) return batches without tracked selections;
//! the caller maps its selection set through the resulting change set.
//!
//! A view restricted to a line range passes its range as [`LineBounds`].
//! Moves never push text across the range boundary.

use ropey::{
  Rope,
  RopeSlice,
};

use crate::{
  batch::{
    self,
    BatchEntry,
    BatchOutcome,
    EditBatch,
    EditDescriptor,
    resolve_batch,
  },
  config::EditorConfig,
  indent::{
    leading_whitespace,
    suggested_indent,
  },
  line_selection::{
    LineSelectionOptions,
    convert_to_line_selections,
  },
  position::{
    Position,
    clip_position,
    line_count,
    line_len,
    line_text,
    position_at_visual_column,
    range_text,
    visual_column,
  },
  selection::{
    Selection,
    TrackedSelection,
  },
  transaction::ChangeSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
  Up,
  Down,
}

/// The lines a view shows, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineBounds {
  pub first: usize,
  pub last:  usize,
}

impl LineBounds {
  pub fn new(first: usize, last: usize) -> Self {
    Self { first, last }
  }

  /// Every line of `text`.
  pub fn of(text: RopeSlice) -> Self {
    Self {
      first: 0,
      last:  line_count(text).saturating_sub(1),
    }
  }
}

/// Swaps every block of selected lines with the line above or below it.
pub fn move_lines(
  text: RopeSlice,
  selections: &[Selection],
  direction: Direction,
  bounds: LineBounds,
) -> EditBatch {
  let line_sels = convert_to_line_selections(selections, LineSelectionOptions::default());
  let mut batch = EditBatch::new();

  for line_sel in line_sels {
    let start = line_sel.selection_for_edit.start.line;
    let end = line_sel.selection_for_edit.end.line;

    match direction {
      Direction::Up => {
        let tracked = line_sel.selections_to_track.iter().copied();
        if start <= bounds.first {
          batch.push(BatchEntry::pass_through(tracked.map(TrackedSelection::new)));
          continue;
        }

        let prev = range_text(text, Position::line_start(start - 1), Position::line_start(start));
        let reinsert = if end > bounds.last {
          // The block ends the visible text: the line goes after it, without
          // a terminator of its own.
          let last = end - 1;
          let prev = prev.strip_suffix('\n').unwrap_or(&prev);
          EditDescriptor::insert(
            format!("\n{prev}").as_str(),
            Position::new(last, line_len(text, last)),
          )
        } else {
          EditDescriptor::insert(prev.as_str(), Position::line_start(end))
        };

        batch.push(
          BatchEntry::new()
            .with_edits([
              EditDescriptor::delete(Position::line_start(start - 1), Position::line_start(start)),
              reinsert,
            ])
            .track_all(tracked.map(|sel| {
              TrackedSelection::pre_adjusted(
                sel.with_bounds(sel.start.offset_lines(-1), sel.end.offset_lines(-1)),
              )
            })),
        );
      },
      Direction::Down => {
        if end > bounds.last {
          continue;
        }

        let entry = if end == bounds.last {
          // Pull the last visible line up by removing the terminator in
          // front of it rather than the one after it.
          let next = format!("{}\n", line_text(text, end));
          BatchEntry::new().with_edits([
            EditDescriptor::delete(
              Position::new(end - 1, line_len(text, end - 1)),
              Position::new(end, line_len(text, end)),
            ),
            EditDescriptor::insert(next.as_str(), Position::line_start(start)),
          ])
        } else {
          let next = range_text(text, Position::line_start(end), Position::line_start(end + 1));
          BatchEntry::new().with_edits([
            EditDescriptor::delete(Position::line_start(end), Position::line_start(end + 1)),
            EditDescriptor::insert(next.as_str(), Position::line_start(start)),
          ])
        };
        batch.push(entry);
      },
    }
  }

  batch
}

/// Copies the line under every cursor above itself, and every selected range
/// in front of itself.
pub fn duplicate_selections(text: RopeSlice, selections: &[Selection]) -> EditBatch {
  let (cursors, ranges): (Vec<Selection>, Vec<Selection>) =
    selections.iter().copied().partition(Selection::is_empty);
  let line_count = line_count(text);

  let lines = convert_to_line_selections(&cursors, LineSelectionOptions::default())
    .into_iter()
    .map(|line_sel| {
      let sel = line_sel.selection_for_edit;
      let mut copy = range_text(text, sel.start, sel.end);
      if sel.end.line >= line_count {
        copy.push('\n');
      }
      BatchEntry::new().with_edit(EditDescriptor::insert(copy.as_str(), sel.start))
    });
  let ranges = ranges.into_iter().map(|sel| {
    BatchEntry::new().with_edit(EditDescriptor::insert(
      range_text(text, sel.start, sel.end).as_str(),
      sel.start,
    ))
  });

  lines.chain(ranges).collect()
}

/// Deletes every line touched by a selection.
pub fn delete_lines(text: RopeSlice, selections: &[Selection], bounds: LineBounds) -> EditBatch {
  convert_to_line_selections(selections, LineSelectionOptions::default())
    .into_iter()
    .map(|line_sel| {
      let mut from = line_sel.selection_for_edit.start;
      let mut to = line_sel.selection_for_edit.end;
      if to.line > bounds.last {
        // No line after the block: take the terminator before it, unless the
        // block is everything there is.
        if from.line > bounds.first {
          from = Position::new(from.line - 1, line_len(text, from.line - 1));
        }
        to = Position::new(to.line - 1, line_len(text, to.line - 1));
      }
      BatchEntry::new().with_edit(EditDescriptor::delete(from, to))
    })
    .collect()
}

/// The first pass of opening lines: one empty line per distinct target line,
/// with a cursor on it.
pub fn open_line_batch(
  text: RopeSlice,
  selections: &[Selection],
  direction: Direction,
  bounds: LineBounds,
) -> EditBatch {
  let mut entries: Vec<BatchEntry> = Vec::with_capacity(selections.len());

  for (idx, sel) in selections.iter().enumerate() {
    let distinct = idx == 0
      || match direction {
        Direction::Up => sel.start.line > selections[idx - 1].start.line,
        Direction::Down => sel.end.line > selections[idx - 1].end.line,
      };
    if !distinct {
      if sel.primary {
        if let Some(tracked) = entries.last_mut().and_then(|entry| entry.selections.first_mut()) {
          tracked.selection.primary = true;
        }
      }
      continue;
    }

    let line = match direction {
      Direction::Up => sel.start.line,
      // A selection of whole lines already ends on the line below them.
      Direction::Down if !sel.is_empty() && sel.end.ch == 0 => sel.end.line,
      Direction::Down => sel.end.line + 1,
    };
    let (insert_at, cursor) = if line > bounds.last && line > 0 {
      (
        Position::new(line - 1, line_len(text, line - 1)),
        Position::line_start(line),
      )
    } else {
      (Position::line_start(line), Position::line_start(line))
    };

    entries.push(
      BatchEntry::new()
        .with_edit(EditDescriptor::insert("\n", insert_at))
        .track(TrackedSelection::pre_adjusted(
          Selection::cursor(cursor).with_primary(sel.primary),
        )),
    );
  }

  entries.into_iter().collect()
}

/// Opens a line above or below every selection and indents it. Both passes
/// come back as one change set.
pub fn open_lines(
  text: &Rope,
  selections: &[Selection],
  direction: Direction,
  bounds: LineBounds,
  config: &EditorConfig,
) -> batch::Result<BatchOutcome> {
  let batch = open_line_batch(text.slice(..), selections, direction, bounds);
  let inserted = resolve_batch(text, &batch)?;
  let scratch = inserted.changes.apply_to(text)?;
  let slice = scratch.slice(..);

  let mut targets = inserted.selections;
  targets.sort_by_key(|sel| sel.start.line);
  targets.dedup_by_key(|sel| sel.start.line);

  let mut indents = Vec::with_capacity(targets.len());
  let mut cursors = Vec::with_capacity(targets.len());
  for sel in targets {
    let line = sel.start.line;
    let indent = suggested_indent(slice, line, config);
    let current = leading_whitespace(&line_text(slice, line));
    let start = slice.line_to_char(line);
    let end_ch = line_len(slice, line) - current + indent.len();
    cursors.push(sel.with_bounds(Position::new(line, end_ch), Position::new(line, end_ch)));
    indents.push((start, start + current, Some(indent.as_str().into())));
  }

  let indents = ChangeSet::change(&scratch, indents)?;
  let changes = inserted.changes.compose(indents)?;
  tracing::trace!(lines = cursors.len(), "opened lines");
  Ok(BatchOutcome {
    changes,
    selections: cursors,
  })
}

/// Every selection grown to whole lines, including the line break.
pub fn select_lines(text: RopeSlice, selections: &[Selection]) -> Vec<Selection> {
  let options = LineSelectionOptions {
    expand_end_at_start_of_line: true,
    ..Default::default()
  };
  convert_to_line_selections(selections, options)
    .into_iter()
    .map(|line_sel| {
      let sel = line_sel.selection_for_edit;
      sel.with_bounds(clip_position(text, sel.start), clip_position(text, sel.end))
    })
    .collect()
}

/// Splits every multi-line selection into one selection per line. A range
/// ending at column 0 does not take in the line it ends on.
pub fn split_into_lines(text: RopeSlice, selections: &[Selection]) -> Vec<Selection> {
  let mut result = Vec::with_capacity(selections.len());
  for sel in selections {
    let (from, to) = (sel.start, sel.end);
    for line in from.line..=to.line {
      if to.line > from.line && line == to.line && to.ch == 0 {
        continue;
      }
      let start = if line == from.line {
        from
      } else {
        Position::line_start(line)
      };
      let end = if line == to.line {
        to
      } else {
        Position::new(line, line_len(text, line))
      };
      let primary = sel.primary && line == from.line;
      result.push(Selection {
        start,
        end,
        primary,
        reversed: sel.reversed,
      });
    }
  }
  result
}

/// Adds a cursor on the line above or below every selection, at the same
/// visual column. The cursor added for the primary selection becomes primary.
pub fn add_cursors(
  text: RopeSlice,
  selections: &[Selection],
  direction: Direction,
  bounds: LineBounds,
  tab_size: usize,
) -> Vec<Selection> {
  let mut result: Vec<Selection> = selections.to_vec();
  let mut added = Vec::new();
  for sel in &mut result {
    let from = match direction {
      Direction::Up if sel.start.line > bounds.first => sel.start,
      Direction::Down if sel.end.line < bounds.last => sel.end,
      _ => continue,
    };
    let column = visual_column(text, from, tab_size);
    let line = match direction {
      Direction::Up => from.line - 1,
      Direction::Down => from.line + 1,
    };
    let pos = position_at_visual_column(text, line, column, tab_size);
    added.push(Selection::cursor(pos).with_primary(sel.primary));
    sel.primary = false;
  }
  result.extend(added);
  result
}
