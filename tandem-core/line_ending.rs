use std::borrow::Cow;

use ropey::{
  Rope,
  RopeSlice,
};

#[cfg(target_os = "windows")]
pub const NATIVE_LINE_ENDING: LineEnding = LineEnding::Crlf;

#[cfg(not(target_os = "windows"))]
pub const NATIVE_LINE_ENDING: LineEnding = LineEnding::LF;

/// Line terminators a buffer can be saved with. Buffers always hold `\n`
/// internally; the detected ending is only used when the text leaves the
/// buffer again.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub enum LineEnding {
  /// CarriageReturn followed by LineFeed.
  Crlf,

  /// U+000A -- LineFeed
  #[default]
  LF,
}

impl LineEnding {
  #[inline]
  pub const fn len_chars(&self) -> usize {
    match self {
      Self::Crlf => 2,
      Self::LF => 1,
    }
  }

  #[inline]
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::Crlf => "\u{000D}\u{000A}",
      Self::LF => "\u{000A}",
    }
  }

  #[inline]
  pub const fn from_char(ch: char) -> Option<LineEnding> {
    match ch {
      '\u{000A}' => Some(LineEnding::LF),
      _ => None,
    }
  }

  #[allow(clippy::should_implement_trait)]
  #[inline]
  pub fn from_str(g: &str) -> Option<LineEnding> {
    match g {
      "\u{000D}\u{000A}" => Some(LineEnding::Crlf),
      "\u{000A}" => Some(LineEnding::LF),
      _ => None,
    }
  }

  #[inline]
  pub fn from_rope_slice(g: &RopeSlice) -> Option<LineEnding> {
    // Ropey keeps CRLF contiguous, so a split slice is never a line ending.
    g.as_str().and_then(LineEnding::from_str)
  }
}

#[inline]
pub fn str_is_line_ending(s: &str) -> bool {
  LineEnding::from_str(s).is_some()
}

/// Detects the line ending used by the first lines of `text`.
pub fn auto_detect_line_ending(text: &str) -> Option<LineEnding> {
  let idx = text.find('\n')?;
  if text[..idx].ends_with('\r') {
    Some(LineEnding::Crlf)
  } else {
    Some(LineEnding::LF)
  }
}

/// Rewrites every `\r\n` and lone `\r` to `\n`. Borrows when nothing changes.
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
  if !text.contains('\r') {
    return Cow::Borrowed(text);
  }

  let mut out = String::with_capacity(text.len());
  let mut chars = text.chars().peekable();
  while let Some(ch) = chars.next() {
    if ch == '\r' {
      if chars.peek() == Some(&'\n') {
        chars.next();
      }
      out.push('\n');
    } else {
      out.push(ch);
    }
  }
  Cow::Owned(out)
}

/// Re-expands `\n` to `ending`.
pub fn with_line_ending(text: &Rope, ending: LineEnding) -> String {
  let mut out = String::with_capacity(text.len_bytes());
  for chunk in text.chunks() {
    match ending {
      LineEnding::LF => out.push_str(chunk),
      LineEnding::Crlf => out.push_str(&chunk.replace('\n', ending.as_str())),
    }
  }
  out
}

/// Returns the passed line's line ending, if any.
pub fn get_line_ending(line: &RopeSlice) -> Option<LineEnding> {
  let len = line.len_chars();
  let g1 = line.slice(len.saturating_sub(1)..).as_str().unwrap_or("");
  let g2 = line.slice(len.saturating_sub(2)..).as_str().unwrap_or("");

  LineEnding::from_str(g2).or_else(|| LineEnding::from_str(g1))
}

/// Returns the char index of the end of the given line, not including its line
/// ending.
pub fn line_end_char_index(slice: &RopeSlice, line: usize) -> usize {
  slice.line_to_char(line + 1)
    - get_line_ending(&slice.line(line))
      .map(|le| le.len_chars())
      .unwrap_or(0)
}

/// Get line `line_idx` from the passed rope slice, sans any line ending.
pub fn line_without_line_ending<'a>(slice: &RopeSlice<'a>, line_idx: usize) -> RopeSlice<'a> {
  let start = slice.line_to_char(line_idx);
  let end = line_end_char_index(slice, line_idx);
  slice.slice(start..end)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn detects_endings() {
    assert_eq!(auto_detect_line_ending("a\r\nb"), Some(LineEnding::Crlf));
    assert_eq!(auto_detect_line_ending("a\nb\r\n"), Some(LineEnding::LF));
    assert_eq!(auto_detect_line_ending("single line"), None);
  }

  #[test]
  fn normalizes_to_lf() {
    assert!(matches!(normalize_line_endings("a\nb"), Cow::Borrowed("a\nb")));
    assert_eq!(normalize_line_endings("a\r\nb\rc"), "a\nb\nc");
  }

  #[test]
  fn expands_crlf() {
    let rope = Rope::from("a\nb\n");
    assert_eq!(with_line_ending(&rope, LineEnding::Crlf), "a\r\nb\r\n");
    assert_eq!(with_line_ending(&rope, LineEnding::LF), "a\nb\n");
  }

  #[test]
  fn line_end_skips_terminator() {
    let rope = Rope::from("foo\nbar");
    let slice = rope.slice(..);
    assert_eq!(line_end_char_index(&slice, 0), 3);
    assert_eq!(line_end_char_index(&slice, 1), 7);
    assert_eq!(line_without_line_ending(&slice, 0), "foo");
  }

  quickcheck::quickcheck! {
    fn normalized_text_has_only_line_feeds(text: String) -> bool {
      let normalized = normalize_line_endings(&text);
      // Every \r\n pair, lone \r and lone \n becomes one \n.
      let breaks = text.matches('\r').count() + text.matches('\n').count()
        - text.matches("\r\n").count();
      !normalized.contains('\r') && normalized.matches('\n').count() == breaks
    }

    fn crlf_expansion_normalizes_back(text: String) -> bool {
      let normalized = normalize_line_endings(&text).into_owned();
      let expanded = with_line_ending(&Rope::from(normalized.as_str()), LineEnding::Crlf);
      normalize_line_endings(&expanded) == normalized
    }
  }
}
