use ropey::RopeSlice;

use crate::chars::char_is_whitespace;

pub trait RopeSliceExt<'a>: Sized {
  /// Char index of the first non-whitespace char, if any.
  fn first_non_whitespace_char(self) -> Option<usize>;
  /// Char index of the last non-whitespace char, if any.
  fn last_non_whitespace_char(self) -> Option<usize>;
  fn starts_with(self, text: &str) -> bool;
  fn ends_with(self, text: &str) -> bool;
  /// Whether the slice holds nothing but whitespace.
  fn is_blank(self) -> bool {
    self.first_non_whitespace_char().is_none()
  }
}

impl<'a> RopeSliceExt<'a> for RopeSlice<'a> {
  fn first_non_whitespace_char(self) -> Option<usize> {
    self.chars().position(|ch| !char_is_whitespace(ch))
  }

  fn last_non_whitespace_char(self) -> Option<usize> {
    self
      .chars_at(self.len_chars())
      .reversed()
      .position(|ch| !char_is_whitespace(ch))
      .map(|pos| self.len_chars() - pos - 1)
  }

  fn starts_with(self, text: &str) -> bool {
    let len = self.len_bytes();
    if len < text.len() {
      return false;
    }
    self.get_byte_slice(..text.len()).is_some_and(|start| start == text)
  }

  fn ends_with(self, text: &str) -> bool {
    let len = self.len_bytes();
    if len < text.len() {
      return false;
    }
    self
      .get_byte_slice(len - text.len()..)
      .is_some_and(|end| end == text)
  }
}
