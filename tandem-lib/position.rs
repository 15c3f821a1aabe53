use std::{
  borrow::Cow,
  fmt,
};

use ropey::RopeSlice;
use tandem_core::line_ending::line_without_line_ending;

/// A point in a buffer: zero-based line and a column counted in UTF-16 code
/// units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
  pub line: usize,
  pub ch:   usize,
}

impl Position {
  pub const fn new(line: usize, ch: usize) -> Self {
    Self { line, ch }
  }

  pub const fn zero() -> Self {
    Self { line: 0, ch: 0 }
  }

  /// Start of `line`.
  pub const fn line_start(line: usize) -> Self {
    Self { line, ch: 0 }
  }

  /// Same line, shifted by `delta` lines. Saturates at line 0.
  pub fn offset_lines(self, delta: isize) -> Self {
    Self {
      line: self.line.saturating_add_signed(delta),
      ch:   self.ch,
    }
  }
}

impl From<(usize, usize)> for Position {
  fn from((line, ch): (usize, usize)) -> Self {
    Position::new(line, ch)
  }
}

impl fmt::Display for Position {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.ch)
  }
}

/// Number of lines in `text`. An empty buffer and a buffer ending in `\n`
/// both count their trailing empty line.
#[inline]
pub fn line_count(text: RopeSlice) -> usize {
  text.len_lines()
}

/// Length of `line` in UTF-16 code units, without its terminator. Lines past
/// the end have length 0.
pub fn line_len(text: RopeSlice, line: usize) -> usize {
  if line >= text.len_lines() {
    return 0;
  }
  line_without_line_ending(&text, line).len_utf16_cu()
}

/// Text of `line` without its terminator. Lines past the end are empty.
pub fn line_text(text: RopeSlice<'_>, line: usize) -> Cow<'_, str> {
  if line >= text.len_lines() {
    return Cow::Borrowed("");
  }
  line_without_line_ending(&text, line).into()
}

/// Resolves `pos` to a char index. A line past the end clamps to the end of
/// the buffer, a column past the end of its line clamps to the line end.
pub fn char_idx_at_position(text: RopeSlice, pos: Position) -> usize {
  if pos.line >= text.len_lines() {
    return text.len_chars();
  }
  let line_start = text.line_to_char(pos.line);
  let line = line_without_line_ending(&text, pos.line);
  let ch = pos.ch.min(line.len_utf16_cu());
  line_start + line.utf16_cu_to_char(ch)
}

/// Text between two positions, clamped to the buffer.
pub fn range_text(text: RopeSlice, start: Position, end: Position) -> String {
  let from = char_idx_at_position(text, start);
  let to = char_idx_at_position(text, end).max(from);
  text.slice(from..to).to_string()
}

/// Converts a char index back to a `Position`.
pub fn position_at_char_idx(text: RopeSlice, idx: usize) -> Position {
  let idx = idx.min(text.len_chars());
  let line = text.char_to_line(idx);
  let line_start = text.line_to_char(line);
  Position::new(line, text.slice(line_start..idx).len_utf16_cu())
}

/// Clamps `pos` into `text` the same way [`char_idx_at_position`] does.
pub fn clip_position(text: RopeSlice, pos: Position) -> Position {
  position_at_char_idx(text, char_idx_at_position(text, pos))
}

/// Visual column of `pos`, expanding tabs to `tab_size`.
pub fn visual_column(text: RopeSlice, pos: Position, tab_size: usize) -> usize {
  let pos = clip_position(text, pos);
  let start = text.line_to_char(pos.line);
  let end = char_idx_at_position(text, pos);
  let tab_size = tab_size.max(1);
  text.slice(start..end).chars().fold(0, |column, ch| {
    if ch == '\t' {
      column + tab_size - column % tab_size
    } else {
      column + 1
    }
  })
}

/// Inverse of [`visual_column`]: the position on `line` whose visual column
/// is `column`, or the line end when the line is shorter.
pub fn position_at_visual_column(
  text: RopeSlice,
  line: usize,
  column: usize,
  tab_size: usize,
) -> Position {
  if line >= text.len_lines() {
    return position_at_char_idx(text, text.len_chars());
  }
  let tab_size = tab_size.max(1);
  let mut current = 0;
  let mut ch = 0;
  for c in line_without_line_ending(&text, line).chars() {
    if current >= column {
      break;
    }
    current = if c == '\t' {
      current + tab_size - current % tab_size
    } else {
      current + 1
    };
    ch += c.len_utf16();
  }
  Position::new(line, ch)
}
