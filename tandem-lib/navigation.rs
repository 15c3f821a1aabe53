//! Horizontal cursor movement and character deletion with soft tabs.
//!
//! With soft tabs on and tab characters off, indentation made of spaces
//! behaves like tab stops: moving or deleting over it jumps to the previous
//! or next multiple of the indent unit. Everything else moves one character.

use std::borrow::Cow;

use tandem_core::chars::char_is_whitespace;

use crate::{
  config::EditorConfig,
  position::Position,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationIntent {
  MoveLeft,
  MoveRight,
  DeleteBackward,
  DeleteForward,
}

impl NavigationIntent {
  pub fn is_forward(self) -> bool {
    matches!(self, Self::MoveRight | Self::DeleteForward)
  }

  pub fn deletes(self) -> bool {
    matches!(self, Self::DeleteBackward | Self::DeleteForward)
  }
}

/// Whatever holds the cursors being moved.
pub trait NavigationBackend {
  type Error;

  fn config(&self) -> &EditorConfig;

  /// The cursor that decides how far to jump.
  fn primary_cursor(&self) -> Option<Position>;

  fn line_text(&self, line: usize) -> Cow<'_, str>;

  /// Moves every selection by `amount` chars, backward when negative.
  fn move_chars(&mut self, amount: isize) -> Result<(), Self::Error>;

  /// Deletes `amount` chars at every cursor, backward when negative.
  /// Non-empty selections are deleted instead.
  fn delete_chars(&mut self, amount: isize) -> Result<(), Self::Error>;
}

fn is_whitespace_unit(unit: u16) -> bool {
  char::from_u32(u32::from(unit)).is_some_and(char_is_whitespace)
}

/// How far a soft tab jump from column `ch` goes, or `None` when the move is
/// a single character.
pub fn soft_tab_jump(line: &str, ch: usize, forward: bool, indent_unit: usize) -> Option<usize> {
  let unit = indent_unit.max(1);
  let units: Vec<u16> = line.encode_utf16().collect();
  let ch = ch.min(units.len());
  let offset = ch % unit;

  if forward {
    let jump = unit - offset;
    if ch + jump > units.len() {
      return None;
    }
    units[ch..ch + jump]
      .iter()
      .all(|&unit| is_whitespace_unit(unit))
      .then_some(jump)
  } else {
    if ch == 0 {
      return None;
    }
    let jump = if offset == 0 { unit } else { offset };
    // Only the whitespace right before the cursor is jumped over.
    let trailing = units[ch - jump..ch]
      .iter()
      .rev()
      .take_while(|&&unit| is_whitespace_unit(unit))
      .count();
    (trailing > 0).then_some(trailing)
  }
}

/// Performs `intent` on `backend`.
pub fn navigate<B: NavigationBackend>(backend: &mut B, intent: NavigationIntent) -> Result<(), B::Error> {
  let jump = {
    let config = backend.config();
    let soft = config.soft_tabs && !config.use_tab_char;
    let unit = config.indent_unit;
    soft
      .then(|| backend.primary_cursor())
      .flatten()
      .and_then(|cursor| {
        soft_tab_jump(&backend.line_text(cursor.line), cursor.ch, intent.is_forward(), unit)
      })
  };
  let amount = jump.unwrap_or(1) as isize;
  let amount = if intent.is_forward() { amount } else { -amount };

  tracing::trace!(?intent, amount, "navigating");
  if intent.deletes() {
    backend.delete_chars(amount)
  } else {
    backend.move_chars(amount)
  }
}
