use crate::line_ending::LineEnding;

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum CharCategory {
  Whitespace,
  Eol,
  Word,
  Punctuation,
  Unknown,
}

pub fn categorize_char(ch: char) -> CharCategory {
  match ch {
    c if char_is_line_ending(c) => CharCategory::Eol,
    c if char_is_whitespace(c) => CharCategory::Whitespace,
    c if char_is_word(c) => CharCategory::Word,
    c if char_is_punctuation(c) => CharCategory::Punctuation,
    _ => CharCategory::Unknown,
  }
}

#[inline]
pub fn char_is_line_ending(ch: char) -> bool {
  LineEnding::from_char(ch).is_some()
}

/// Whitespace as far as indentation and blank-line detection are concerned.
/// Includes the zero width no-break space so a stray BOM counts as blank.
#[inline]
pub fn char_is_whitespace(ch: char) -> bool {
  ch.is_whitespace() || ch == '\u{FEFF}'
}

#[inline]
pub fn char_is_punctuation(ch: char) -> bool {
  use unicode_general_category::{
    GeneralCategory,
    get_general_category,
  };

  matches!(
    get_general_category(ch),
    GeneralCategory::OtherPunctuation
      | GeneralCategory::OpenPunctuation
      | GeneralCategory::ClosePunctuation
      | GeneralCategory::InitialPunctuation
      | GeneralCategory::FinalPunctuation
      | GeneralCategory::ConnectorPunctuation
      | GeneralCategory::DashPunctuation
      | GeneralCategory::MathSymbol
      | GeneralCategory::CurrencySymbol
      | GeneralCategory::ModifierSymbol
  )
}

#[inline]
pub fn char_is_word(ch: char) -> bool {
  ch.is_alphanumeric() || ch == '_'
}

/// Brackets that open an indented block.
#[inline]
pub fn char_opens_block(ch: char) -> bool {
  matches!(ch, '{' | '[' | '(')
}

/// Brackets that close an indented block. Typing one of these at the start
/// of a line re-indents it.
#[inline]
pub fn char_closes_block(ch: char) -> bool {
  matches!(ch, '}' | ']' | ')')
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn categories() {
    assert_eq!(categorize_char('\n'), CharCategory::Eol);
    assert_eq!(categorize_char('\t'), CharCategory::Whitespace);
    assert_eq!(categorize_char('\u{FEFF}'), CharCategory::Whitespace);
    assert_eq!(categorize_char('x'), CharCategory::Word);
    assert_eq!(categorize_char('_'), CharCategory::Word);
    assert_eq!(categorize_char(';'), CharCategory::Punctuation);
    assert_eq!(categorize_char('+'), CharCategory::Punctuation);
  }

  #[test]
  fn block_brackets() {
    for ch in ['{', '[', '('] {
      assert!(char_opens_block(ch));
      assert!(!char_closes_block(ch));
    }
    for ch in ['}', ']', ')'] {
      assert!(char_closes_block(ch));
    }
    assert!(!char_closes_block('>'));
  }

  quickcheck::quickcheck! {
    fn only_line_feed_is_an_end_of_line(ch: char) -> bool {
      (categorize_char(ch) == CharCategory::Eol) == (ch == '\n')
    }
  }
}
