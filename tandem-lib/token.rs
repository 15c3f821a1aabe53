//! A small tokenizer for locating comments, and a cursor that walks its
//! tokens across lines.
//!
//! Tokens never span lines. A block comment that continues on the next line
//! is reported as one comment token per line; on a continuation line the
//! token starts at column 0, leading whitespace included. Columns are UTF-16
//! code units, like [`Position::ch`].

use ropey::RopeSlice;
use tandem_core::chars::{
  char_is_whitespace,
  char_is_word,
};

use crate::{
  language::Language,
  position::{
    Position,
    line_count,
    line_len,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Comment,
  String,
  Whitespace,
  Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind:  TokenKind,
  pub start: usize,
  pub end:   usize,
  pub text:  String,
}

impl Token {
  /// The empty token reported at column 0 of every line.
  pub fn start_of_line() -> Self {
    Self {
      kind:  TokenKind::Whitespace,
      start: 0,
      end:   0,
      text:  String::new(),
    }
  }

  /// Whitespace, or an empty token. Comments and strings never count.
  pub fn is_blank(&self) -> bool {
    matches!(self.kind, TokenKind::Whitespace | TokenKind::Text)
      && self.text.chars().all(char_is_whitespace)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Forward,
  Backward,
}

fn starts_at(chars: &[char], idx: usize, pattern: &str) -> bool {
  !pattern.is_empty()
    && pattern
      .chars()
      .enumerate()
      .all(|(offset, ch)| chars.get(idx + offset) == Some(&ch))
}

fn find_from(chars: &[char], from: usize, pattern: &str) -> Option<usize> {
  (from..chars.len()).find(|&idx| starts_at(chars, idx, pattern))
}

/// Tokenizes one line. `in_block` tells whether the line starts inside a
/// block comment; the returned flag tells whether the next one does.
pub fn tokenize_line(line: &str, language: &Language, in_block: bool) -> (Vec<Token>, bool) {
  let chars: Vec<char> = line.chars().collect();
  let mut columns = Vec::with_capacity(chars.len() + 1);
  let mut column = 0;
  for ch in &chars {
    columns.push(column);
    column += ch.len_utf16();
  }
  columns.push(column);

  let mut tokens = Vec::new();
  let mut push = |kind: TokenKind, from: usize, to: usize| {
    tokens.push(Token {
      kind,
      start: columns[from],
      end: columns[to],
      text: chars[from..to].iter().collect(),
    });
  };

  let block = language.block_comment.as_ref();
  let len = chars.len();
  let mut idx = 0;

  if in_block {
    let Some(block) = block else {
      return (tokens, false);
    };
    match find_from(&chars, 0, &block.end) {
      Some(end) => {
        idx = end + block.end.chars().count();
        push(TokenKind::Comment, 0, idx);
      },
      None => {
        if len > 0 {
          push(TokenKind::Comment, 0, len);
        }
        return (tokens, true);
      },
    }
  }

  while idx < len {
    let ch = chars[idx];

    if char_is_whitespace(ch) {
      let end = (idx..len)
        .find(|&i| !char_is_whitespace(chars[i]))
        .unwrap_or(len);
      push(TokenKind::Whitespace, idx, end);
      idx = end;
      continue;
    }

    if let Some(block) = block {
      if starts_at(&chars, idx, &block.start) {
        let body = idx + block.start.chars().count();
        match find_from(&chars, body, &block.end) {
          Some(end) => {
            let end = end + block.end.chars().count();
            push(TokenKind::Comment, idx, end);
            idx = end;
            continue;
          },
          None => {
            push(TokenKind::Comment, idx, len);
            return (tokens, true);
          },
        }
      }
    }

    if language
      .line_comment
      .iter()
      .any(|prefix| starts_at(&chars, idx, prefix))
    {
      push(TokenKind::Comment, idx, len);
      break;
    }

    if language.string_quotes.contains(&ch) {
      let mut end = idx + 1;
      while end < len {
        if chars[end] == '\\' {
          end += 2;
          continue;
        }
        end += 1;
        if chars[end - 1] == ch {
          break;
        }
      }
      let end = end.min(len);
      push(TokenKind::String, idx, end);
      idx = end;
      continue;
    }

    let end = if char_is_word(ch) {
      (idx..len).find(|&i| !char_is_word(chars[i])).unwrap_or(len)
    } else {
      idx + 1
    };
    push(TokenKind::Text, idx, end);
    idx = end;
  }

  (tokens, false)
}

/// Tokenizes a buffer on demand, remembering which lines start inside a
/// block comment.
#[derive(Debug)]
pub struct Tokenizer<'a> {
  text:         RopeSlice<'a>,
  language:     &'a Language,
  block_states: Vec<bool>,
}

impl<'a> Tokenizer<'a> {
  pub fn new(text: RopeSlice<'a>, language: &'a Language) -> Self {
    Self {
      text,
      language,
      block_states: vec![false],
    }
  }

  pub fn text(&self) -> RopeSlice<'a> {
    self.text
  }

  fn line_text(&self, line: usize) -> String {
    if line >= line_count(self.text) {
      return String::new();
    }
    tandem_core::line_ending::line_without_line_ending(&self.text, line).to_string()
  }

  fn starts_in_block(&mut self, line: usize) -> bool {
    while self.block_states.len() <= line {
      let prev = self.block_states.len() - 1;
      let state = self.block_states[prev];
      let (_, next) = tokenize_line(&self.line_text(prev), self.language, state);
      self.block_states.push(next);
    }
    self.block_states[line]
  }

  pub fn line_tokens(&mut self, line: usize) -> Vec<Token> {
    let in_block = self.starts_in_block(line);
    tokenize_line(&self.line_text(line), self.language, in_block).0
  }

  /// The token that ends at or after `pos.ch`: the token whose span
  /// `(start, end]` holds the column. Column 0 is the empty start-of-line
  /// token; a column past the end is the last token.
  pub fn token_at(&mut self, pos: Position) -> Token {
    if pos.ch == 0 {
      return Token::start_of_line();
    }
    let tokens = self.line_tokens(pos.line);
    let Some(last) = tokens.last() else {
      return Token::start_of_line();
    };
    tokens
      .iter()
      .find(|token| token.end >= pos.ch)
      .unwrap_or(last)
      .clone()
  }
}

/// A bidirectional cursor over tokens.
///
/// Stepping past the last token of a line lands on the next line's empty
/// start-of-line token; stepping back from the first token lands on the last
/// token of the previous line.
#[derive(Debug)]
pub struct TokenCursor<'a> {
  tokenizer: Tokenizer<'a>,
  pos:       Position,
  token:     Token,
}

impl<'a> TokenCursor<'a> {
  pub fn at(text: RopeSlice<'a>, language: &'a Language, pos: Position) -> Self {
    let mut tokenizer = Tokenizer::new(text, language);
    let token = tokenizer.token_at(pos);
    Self {
      tokenizer,
      pos,
      token,
    }
  }

  pub fn token(&self) -> &Token {
    &self.token
  }

  pub fn pos(&self) -> Position {
    self.pos
  }

  pub fn move_next(&mut self) -> bool {
    let text = self.tokenizer.text();
    let eol = line_len(text, self.pos.line);
    if self.pos.ch >= eol || self.token.end >= eol {
      if self.pos.line + 1 >= line_count(text) {
        return false;
      }
      self.pos = Position::line_start(self.pos.line + 1);
    } else {
      self.pos.ch = self.token.end + 1;
    }
    self.token = self.tokenizer.token_at(self.pos);
    true
  }

  pub fn move_prev(&mut self) -> bool {
    if self.pos.ch == 0 || self.token.start == 0 {
      if self.pos.line == 0 {
        return false;
      }
      let line = self.pos.line - 1;
      self.pos = Position::new(line, line_len(self.tokenizer.text(), line));
    } else {
      self.pos.ch = self.token.start;
    }
    self.token = self.tokenizer.token_at(self.pos);
    true
  }

  /// Moves one token, then keeps moving while the token is blank.
  pub fn skip_whitespace(&mut self, direction: Direction) -> bool {
    let step = |cursor: &mut Self| match direction {
      Direction::Forward => cursor.move_next(),
      Direction::Backward => cursor.move_prev(),
    };
    if !step(self) {
      return false;
    }
    while self.token.is_blank() {
      if !step(self) {
        return false;
      }
    }
    true
  }
}
