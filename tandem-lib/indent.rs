//! Indentation of new and re-typed lines.
//!
//! Smart indent looks at the closest non-blank line above: its indentation
//! is kept, one level is added when it ends by opening a block and one level
//! is removed when the indented line starts by closing one. Without smart
//! indent a line simply copies the indentation above it.

use ropey::RopeSlice;
use tandem_core::{
  chars::{
    char_closes_block,
    char_is_whitespace,
    char_opens_block,
  },
  rope::RopeSliceExt,
};

use crate::{
  config::EditorConfig,
  position::line_text,
  transaction::Change,
};

/// Visual width of the leading whitespace of `line`.
pub fn indent_width(line: &str, tab_size: usize) -> usize {
  let tab_size = tab_size.max(1);
  let mut width = 0;
  for ch in line.chars() {
    match ch {
      ' ' => width += 1,
      '\t' => width = (width / tab_size + 1) * tab_size,
      _ => break,
    }
  }
  width
}

/// Number of leading whitespace chars of `line`.
pub fn leading_whitespace(line: &str) -> usize {
  line.chars().take_while(|&ch| ch == ' ' || ch == '\t').count()
}

/// Whitespace that renders `width` columns wide.
pub fn indent_string(width: usize, config: &EditorConfig) -> String {
  if config.use_tab_char {
    let tab_size = config.tab_size.max(1);
    let mut indent = "\t".repeat(width / tab_size);
    indent.push_str(&" ".repeat(width % tab_size));
    indent
  } else {
    " ".repeat(width)
  }
}

/// The indentation `line` should have.
pub fn suggested_indent(text: RopeSlice, line: usize, config: &EditorConfig) -> String {
  let Some(prev) = (0..line.min(text.len_lines()))
    .rev()
    .find(|&idx| !text.line(idx).is_blank())
  else {
    return String::new();
  };

  let prev_line = text.line(prev);
  let mut width = indent_width(&line_text(text, prev), config.tab_size);
  if config.smart_indent {
    let unit = config.indent_unit.max(1);
    if prev_line
      .last_non_whitespace_char()
      .is_some_and(|idx| char_opens_block(prev_line.char(idx)))
    {
      width += unit;
    }
    if line_text(text, line)
      .trim_start_matches(char_is_whitespace)
      .chars()
      .next()
      .is_some_and(char_closes_block)
    {
      width = width.saturating_sub(unit);
    }
  }
  indent_string(width, config)
}

/// The change that replaces the indentation of `line` with the suggested one,
/// in char indices of `text`. `None` when it is already right.
pub fn reindent_line(text: RopeSlice, line: usize, config: &EditorConfig) -> Option<Change> {
  if line >= text.len_lines() {
    return None;
  }
  let indent = suggested_indent(text, line, config);
  let content = line_text(text, line);
  let current = leading_whitespace(&content);
  if content.chars().take(current).eq(indent.chars()) {
    return None;
  }
  let start = text.line_to_char(line);
  Some((start, start + current, Some(indent.as_str().into())))
}
