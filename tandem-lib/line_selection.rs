//! Expanding selections to whole lines.

use smallvec::{
  SmallVec,
  smallvec,
};

use crate::{
  position::Position,
  selection::Selection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSelectionOptions {
  /// A range ending at column 0 also takes in the line it ends on.
  pub expand_end_at_start_of_line: bool,
  /// Line selections that touch are combined. Selections on the same line
  /// are always combined.
  pub merge_adjacent:              bool,
}

impl Default for LineSelectionOptions {
  fn default() -> Self {
    Self {
      expand_end_at_start_of_line: false,
      merge_adjacent:              true,
    }
  }
}

/// A whole-line target for an edit, plus the selections it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSelection {
  /// Starts at column 0 and ends at column 0 of the line after the last
  /// covered line, which may be one past the end of the buffer.
  pub selection_for_edit:  Selection,
  pub selections_to_track: SmallVec<[Selection; 1]>,
}

/// Expands each selection of `selections` (sorted by start) to the lines it
/// covers and coalesces the results.
pub fn convert_to_line_selections(
  selections: &[Selection],
  options: LineSelectionOptions,
) -> Vec<LineSelection> {
  let mut combined: Vec<LineSelection> = Vec::with_capacity(selections.len());

  for sel in selections {
    let start = Position::line_start(sel.start.line);
    let end = if options.expand_end_at_start_of_line || sel.is_empty() || sel.end.ch != 0 {
      Position::line_start(sel.end.line + 1)
    } else {
      sel.end
    };

    if let Some(prev) = combined.last_mut() {
      let for_edit = &mut prev.selection_for_edit;
      let touches = if options.merge_adjacent {
        start <= for_edit.end
      } else {
        start < for_edit.end
      };
      if for_edit.start <= start && touches {
        for_edit.end = for_edit.end.max(end);
        for_edit.primary |= sel.primary;
        prev.selections_to_track.push(*sel);
        continue;
      }
    }

    combined.push(LineSelection {
      selection_for_edit:  Selection {
        start,
        end,
        primary: sel.primary,
        reversed: sel.reversed,
      },
      selections_to_track: smallvec![*sel],
    });
  }

  combined
}

#[cfg(test)]
mod test {
  use super::*;

  fn pos(line: usize, ch: usize) -> Position {
    Position::new(line, ch)
  }

  fn range(start: (usize, usize), end: (usize, usize)) -> Selection {
    Selection::new(start.into(), end.into())
  }

  fn bounds(line_sel: &LineSelection) -> (Position, Position) {
    (
      line_sel.selection_for_edit.start,
      line_sel.selection_for_edit.end,
    )
  }

  #[test]
  fn cursor_and_ranges_expand_to_lines() {
    let sels = [
      range((0, 4), (0, 4)),
      range((2, 4), (2, 8)).with_primary(true),
      range((4, 4), (5, 8)),
      range((7, 0), (8, 0)),
    ];
    let result = convert_to_line_selections(&sels, LineSelectionOptions::default());
    assert_eq!(result.len(), 4);
    assert_eq!(bounds(&result[0]), (pos(0, 0), pos(1, 0)));
    assert_eq!(bounds(&result[1]), (pos(2, 0), pos(3, 0)));
    assert!(result[1].selection_for_edit.primary);
    assert_eq!(bounds(&result[2]), (pos(4, 0), pos(6, 0)));
    // A range already ending at column 0 is kept.
    assert_eq!(bounds(&result[3]), (pos(7, 0), pos(8, 0)));
    assert!(result.iter().all(|line_sel| line_sel.selections_to_track.len() == 1));
    assert_eq!(result[2].selections_to_track[0], sels[2]);
  }

  #[test]
  fn expand_end_at_start_of_line() {
    let sels = [range((0, 0), (1, 0))];
    let options = LineSelectionOptions {
      expand_end_at_start_of_line: true,
      ..Default::default()
    };
    let result = convert_to_line_selections(&sels, options);
    assert_eq!(bounds(&result[0]), (pos(0, 0), pos(2, 0)));
  }

  #[test]
  fn merges_same_and_adjacent_lines() {
    let sels = [
      range((0, 4), (0, 4)),
      range((1, 4), (1, 4)).with_primary(true),
      range((4, 0), (5, 0)),
    ];
    let result = convert_to_line_selections(&sels, LineSelectionOptions::default());
    assert_eq!(result.len(), 2);
    assert_eq!(bounds(&result[0]), (pos(0, 0), pos(2, 0)));
    assert_eq!(result[0].selections_to_track.as_slice(), &sels[..2]);
    assert!(result[0].selection_for_edit.primary);
  }

  #[test]
  fn multiline_selections_sharing_a_line_merge() {
    let sels = [range((0, 4), (1, 4)), range((1, 8), (2, 8))];
    let result = convert_to_line_selections(&sels, LineSelectionOptions::default());
    assert_eq!(result.len(), 1);
    assert_eq!(bounds(&result[0]), (pos(0, 0), pos(3, 0)));
    assert_eq!(result[0].selections_to_track.len(), 2);
  }

  #[test]
  fn without_merge_adjacent_only_same_line_merges() {
    let sels = [
      range((0, 2), (0, 2)),
      range((0, 5), (0, 5)),
      range((1, 4), (1, 4)),
    ];
    let options = LineSelectionOptions {
      merge_adjacent: false,
      ..Default::default()
    };
    let result = convert_to_line_selections(&sels, options);
    assert_eq!(result.len(), 2);
    assert_eq!(bounds(&result[0]), (pos(0, 0), pos(1, 0)));
    assert_eq!(result[0].selections_to_track.len(), 2);
    assert_eq!(bounds(&result[1]), (pos(1, 0), pos(2, 0)));
  }

  #[test]
  fn one_line_gap_merges_when_expanding() {
    let sels = [range((0, 0), (1, 0)), range((2, 0), (3, 0))];
    let expand = LineSelectionOptions {
      expand_end_at_start_of_line: true,
      merge_adjacent:              true,
    };
    let result = convert_to_line_selections(&sels, expand);
    assert_eq!(result.len(), 1);
    assert_eq!(bounds(&result[0]), (pos(0, 0), pos(4, 0)));

    let separate = LineSelectionOptions {
      merge_adjacent: false,
      ..expand
    };
    assert_eq!(convert_to_line_selections(&sels, separate).len(), 2);
  }
}
