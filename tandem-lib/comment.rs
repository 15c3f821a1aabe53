//! Line and block comment toggling.
//!
//! Both toggles only compute an [`EditBatch`]; nothing here touches a buffer.
//! Every input selection ends up in exactly one batch entry, including the
//! ones that produce no edit, so the applier can move all of them in one
//! pass.
//!
//! Line comments are recognized per line. A language whose block comment
//! opener starts with a line comment prefix (Lua's `--[[` and `--`) would make
//! the opener look like a line comment, so such prefixes only match when the
//! rest of the opener does not follow.

use ropey::RopeSlice;
use smallvec::SmallVec;
use tandem_core::{
  chars::char_is_whitespace,
  rope::RopeSliceExt,
};

use crate::{
  batch::{
    BatchEntry,
    EditBatch,
    EditDescriptor,
  },
  config::EditorConfig,
  language::{
    BlockCommentToken,
    Language,
  },
  line_selection::{
    LineSelection,
    LineSelectionOptions,
    convert_to_line_selections,
  },
  position::{
    Position,
    line_count,
    line_text,
  },
  selection::{
    Selection,
    TrackedSelection,
  },
  token::{
    Direction,
    TokenCursor,
    TokenKind,
  },
};

/// Which toggle asked for the edit. Indented line comments only apply to the
/// line toggle, even when it falls back to block syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentCommand {
  Line,
  Block,
}

fn utf16_len(text: &str) -> usize {
  text.encode_utf16().count()
}

/// Column of the first non-whitespace character, or the line length.
fn first_non_whitespace(line: &str) -> usize {
  let idx = line
    .char_indices()
    .find(|&(_, ch)| !char_is_whitespace(ch))
    .map_or(line.len(), |(idx, _)| idx);
  utf16_len(&line[..idx])
}

#[derive(Debug, Clone)]
struct LineMatcher<'a> {
  prefix:   &'a str,
  /// The rest of a block delimiter that starts with `prefix`.
  excluded: Option<&'a str>,
}

impl LineMatcher<'_> {
  fn matches(&self, text: &str) -> bool {
    let Some(rest) = text
      .trim_start_matches(char_is_whitespace)
      .strip_prefix(self.prefix)
    else {
      return false;
    };
    match self.excluded {
      None => true,
      Some(excluded) => excluded.is_empty() || !rest.starts_with(excluded),
    }
  }
}

/// Recognizes lines (or token text) that start with a line comment prefix.
#[derive(Debug, Clone, Default)]
pub struct LineMatchers<'a> {
  matchers: Vec<LineMatcher<'a>>,
}

impl<'a> LineMatchers<'a> {
  pub fn new(
    prefixes: &'a [String],
    block_prefix: Option<&'a str>,
    block_suffix: Option<&'a str>,
  ) -> Self {
    let mut matchers = Vec::with_capacity(prefixes.len());
    for prefix in prefixes.iter().map(String::as_str) {
      if prefix.is_empty() {
        continue;
      }
      let mut special = false;
      if let Some(rest) = block_prefix.and_then(|block| block.strip_prefix(prefix)) {
        matchers.push(LineMatcher {
          prefix,
          excluded: Some(rest),
        });
        special = true;
      }
      if block_suffix != block_prefix {
        if let Some(rest) = block_suffix.and_then(|block| block.strip_prefix(prefix)) {
          matchers.push(LineMatcher {
            prefix,
            excluded: Some(rest),
          });
          special = true;
        }
      }
      if !special {
        matchers.push(LineMatcher {
          prefix,
          excluded: None,
        });
      }
    }
    Self { matchers }
  }

  pub fn matches(&self, text: &str) -> bool {
    self.matchers.iter().any(|matcher| matcher.matches(text))
  }

  /// The longest prefix commenting out `line`.
  pub fn line_prefix(&self, line: &str) -> Option<&'a str> {
    self
      .matchers
      .iter()
      .filter(|matcher| matcher.matches(line))
      .map(|matcher| matcher.prefix)
      .fold(None, |longest: Option<&'a str>, prefix| {
        match longest {
          Some(longest) if longest.len() >= prefix.len() => Some(longest),
          _ => Some(prefix),
        }
      })
  }

  /// Whether a non-blank line in `start..=end` is not line-commented.
  pub fn contains_uncommented(&self, text: RopeSlice, start: usize, end: usize) -> bool {
    (start..=end.min(line_count(text).saturating_sub(1)))
      .any(|line| !text.line(line).is_blank() && !self.matches(&line_text(text, line)))
  }
}

/// Builds the batch that comments out, or uncomments, every line touched by
/// `selections`.
pub fn toggle_line_comment(
  text: RopeSlice,
  language: &Language,
  config: &EditorConfig,
  selections: &[Selection],
) -> EditBatch {
  line_comment_entries(text, language, config, selections, CommentCommand::Line)
    .into_iter()
    .collect()
}

/// Builds the batch that wraps each selection in a block comment, or removes
/// the block comment around it.
pub fn toggle_block_comment(
  text: RopeSlice,
  language: &Language,
  config: &EditorConfig,
  selections: &[Selection],
) -> EditBatch {
  let Some(block) = language.block_comment.as_ref() else {
    return selections
      .iter()
      .map(|&sel| BatchEntry::pass_through([TrackedSelection::new(sel)]))
      .collect();
  };

  let mut entries = Vec::with_capacity(selections.len());
  let mut line_commented = Vec::new();
  for &sel in selections {
    let request = BlockRequest {
      text,
      language,
      block,
      line_prefixes: language.line_comment_prefixes(),
      config,
      command: CommentCommand::Block,
    };
    match request.entry(sel, &[sel]) {
      Some(entry) => entries.push(entry),
      // Inside line comments: those are toggled as lines.
      None => line_commented.push(sel),
    }
  }
  entries.extend(line_comment_entries(
    text,
    language,
    config,
    &line_commented,
    CommentCommand::Block,
  ));
  entries.into_iter().collect()
}

fn line_comment_entries(
  text: RopeSlice,
  language: &Language,
  config: &EditorConfig,
  selections: &[Selection],
  command: CommentCommand,
) -> Vec<BatchEntry> {
  // Cursors on one line collapse into one edit, neighbouring lines do not.
  let options = LineSelectionOptions {
    merge_adjacent: false,
    ..Default::default()
  };
  let matchers = LineMatchers::new(
    language.line_comment_prefixes(),
    language.block_comment_prefix(),
    language.block_comment_suffix(),
  );

  convert_to_line_selections(selections, options)
    .into_iter()
    .map(|line_sel| {
      let entry = if language.has_line_comment_syntax() {
        Some(line_comment_entry(
          text,
          &matchers,
          language.line_comment_prefixes(),
          config,
          &line_sel,
        ))
      } else if let Some(block) = language.block_comment.as_ref() {
        line_block_comment_entry(text, language, block, config, &line_sel, command)
      } else {
        None
      };
      entry.unwrap_or_else(|| {
        BatchEntry::pass_through(
          line_sel
            .selections_to_track
            .iter()
            .copied()
            .map(TrackedSelection::new),
        )
      })
    })
    .collect()
}

fn line_comment_entry(
  text: RopeSlice,
  matchers: &LineMatchers,
  prefixes: &[String],
  config: &EditorConfig,
  line_sel: &LineSelection,
) -> BatchEntry {
  let sel = line_sel.selection_for_edit;
  let last_line = line_count(text).saturating_sub(1);
  let start_line = sel.start.line;
  let mut end_line = sel.end.line;
  // A line selection ends at the start of the following line.
  if sel.end.ch == 0 {
    end_line = end_line.saturating_sub(1);
  }
  let end_line = end_line.min(last_line).max(start_line);

  let mut entry = BatchEntry::new();
  if matchers.contains_uncommented(text, start_line, end_line) {
    let prefix = prefixes[0].as_str();
    let prefix_len = utf16_len(prefix);
    let first_indent = first_non_whitespace(&line_text(text, start_line));
    for line in start_line..=end_line {
      let ch = if config.indent_line_comment {
        first_non_whitespace(&line_text(text, line)).min(first_indent)
      } else {
        0
      };
      entry.edits.push(EditDescriptor::insert(prefix, Position::new(line, ch)));
    }

    for tracked in &line_sel.selections_to_track {
      if tracked.start.ch == 0 && !tracked.is_empty() {
        // Ranges starting at column 0 grow to cover the new prefix.
        let end_ch = if tracked.end.line == end_line {
          tracked.end.ch + prefix_len
        } else {
          0
        };
        entry.selections.push(TrackedSelection::pre_adjusted(tracked.with_bounds(
          Position::line_start(tracked.start.line),
          Position::new(tracked.end.line, end_ch),
        )));
      } else {
        entry.selections.push(TrackedSelection::new(*tracked));
      }
    }
  } else {
    for line in start_line..=end_line {
      let content = line_text(text, line);
      let Some(prefix) = matchers.line_prefix(&content) else {
        continue;
      };
      let Some(idx) = content.find(prefix) else {
        continue;
      };
      let ch = utf16_len(&content[..idx]);
      entry.edits.push(EditDescriptor::delete(
        Position::new(line, ch),
        Position::new(line, ch + utf16_len(prefix)),
      ));
    }
    entry.selections.extend(
      line_sel
        .selections_to_track
        .iter()
        .copied()
        .map(TrackedSelection::new),
    );
  }

  entry
}

/// Line comment toggle for a language that only has block comments: the
/// covered lines are wrapped as one block.
fn line_block_comment_entry(
  text: RopeSlice,
  language: &Language,
  block: &BlockCommentToken,
  config: &EditorConfig,
  line_sel: &LineSelection,
  command: CommentCommand,
) -> Option<BatchEntry> {
  let mut sel = line_sel.selection_for_edit;
  if sel.end.line == sel.start.line + 1 && sel.end.ch == 0 {
    // One line: keep the terminator out of the comment.
    sel.end = Position::new(sel.start.line, utf16_len(&line_text(text, sel.start.line)));
  }
  let request = BlockRequest {
    text,
    language,
    block,
    line_prefixes: &[],
    config,
    command,
  };
  request.entry(sel, &line_sel.selections_to_track)
}

struct BlockRequest<'a> {
  text:          RopeSlice<'a>,
  language:      &'a Language,
  block:         &'a BlockCommentToken,
  line_prefixes: &'a [String],
  config:        &'a EditorConfig,
  command:       CommentCommand,
}

impl BlockRequest<'_> {
  fn cursor(&self, pos: Position) -> TokenCursor<'_> {
    TokenCursor::at(self.text, self.language, pos)
  }

  /// The entry for one selection. `None` means the selection sits in line
  /// comments and has to go through the line toggle instead.
  fn entry(&self, sel: Selection, tracked: &[Selection]) -> Option<BatchEntry> {
    let prefix = self.block.start.as_str();
    let suffix = self.block.end.as_str();
    let matchers = LineMatchers::new(self.line_prefixes, Some(prefix), Some(suffix));
    let pass_through = || BatchEntry::pass_through(tracked.iter().copied().map(TrackedSelection::new));

    let mut cursor = self.cursor(sel.start);
    let mut result = true;
    let mut comment_at_start = true;
    let mut can_comment = false;
    let mut invalid = false;
    let mut line_uncomment = false;
    let mut prefix_pos = None;
    let mut suffix_pos = None;

    if cursor.token().is_blank() {
      result = cursor.skip_whitespace(Direction::Forward);
    }
    while result && cursor.token().kind != TokenKind::Comment {
      result = cursor.skip_whitespace(Direction::Forward) && cursor.pos() <= sel.end;
      comment_at_start = false;
    }

    if result && cursor.token().kind == TokenKind::Comment {
      let token = cursor.token().clone();
      let line_start = Position::new(cursor.pos().line, token.start);
      let is_block = if matchers.matches(&token.text) {
        // A line comment at column 0 can still be a line inside a block.
        token.start == 0
          && comment_at_start
          && is_prev_token_block_comment(&mut self.cursor(line_start), prefix, suffix, &matchers)
      } else {
        if token.text == prefix && prefix == suffix {
          // Step inside the comment so both delimiters can be found.
          if is_prev_token_block_comment(&mut self.cursor(line_start), prefix, suffix, &matchers) {
            cursor.skip_whitespace(Direction::Backward);
          } else {
            cursor.skip_whitespace(Direction::Forward);
          }
        }
        true
      };

      if is_block {
        let initial = cursor.pos();
        result = true;
        while result && !cursor.token().text.starts_with(prefix) {
          result = cursor.skip_whitespace(Direction::Backward);
        }
        prefix_pos = result.then(|| Position::new(cursor.pos().line, cursor.token().start));

        if cursor.token().text == prefix && prefix == suffix {
          cursor = self.cursor(initial);
        }
        while result && !cursor.token().text.ends_with(suffix) {
          result = cursor.skip_whitespace(Direction::Forward);
        }
        suffix_pos = result.then(|| {
          Position::new(
            cursor.pos().line,
            cursor.token().end.saturating_sub(utf16_len(suffix)),
          )
        });

        // Another comment opening inside the selection.
        loop {
          result = cursor.skip_whitespace(Direction::Forward) && cursor.pos() <= sel.end;
          if !result || cursor.token().text.starts_with(prefix) {
            break;
          }
        }
        invalid = result;

        // The comment found lies entirely before or after the selection.
        let suffix_end = suffix_pos.map(|pos: Position| Position::new(pos.line, pos.ch + utf16_len(suffix)));
        if suffix_end.is_some_and(|end| sel.start > end)
          || prefix_pos.is_some_and(|start| sel.end < start)
        {
          can_comment = true;
        }
      } else {
        let mut end_line = sel.end.line;
        if sel.end.ch == 0 && !sel.is_empty() {
          end_line = end_line.saturating_sub(1);
        }
        if matchers.contains_uncommented(self.text, sel.start.line, end_line.max(sel.start.line)) {
          can_comment = true;
        } else {
          line_uncomment = true;
        }
      }
    } else {
      can_comment = true;
    }

    if invalid {
      tracing::trace!(selection = ?sel, "block comment inside selection, leaving it alone");
      return Some(pass_through());
    }
    if line_uncomment {
      return None;
    }
    if can_comment {
      return Some(self.comment_out(sel, tracked));
    }

    let Some(prefix_pos) = prefix_pos else {
      tracing::trace!(selection = ?sel, "no block comment opener found");
      return Some(pass_through());
    };
    Some(self.uncomment(prefix_pos, suffix_pos, tracked))
  }

  fn comment_out(&self, sel: Selection, tracked: &[Selection]) -> BatchEntry {
    let prefix = self.block.start.as_str();
    let suffix = self.block.end.as_str();
    let prefix_len = utf16_len(prefix);
    let suffix_len = utf16_len(suffix);
    let indent_command = self.config.indent_line_comment && self.command == CommentCommand::Line;
    let complete_lines = sel.start.ch == 0 && sel.end.ch == 0 && sel.start.line < sel.end.line;
    let start_ch = first_non_whitespace(&line_text(self.text, sel.start.line));
    let indent = if self.config.use_tab_char { "\t" } else { " " };
    // Whole lines ending with the buffer have no following line to put the
    // closing delimiter on.
    let past_end = sel.end.line >= line_count(self.text);
    let buffer_end = Position::new(
      line_count(self.text).saturating_sub(1),
      utf16_len(&line_text(self.text, line_count(self.text).saturating_sub(1))),
    );

    // The opener goes first so both delimiters around a cursor land in
    // order.
    let mut edits: SmallVec<[EditDescriptor; 2]> = SmallVec::new();
    if complete_lines {
      let (suffix_indent, prefix_indent) = if indent_command {
        let end_ch = first_non_whitespace(&line_text(self.text, sel.end.line - 1));
        (indent.repeat(end_ch), indent.repeat(start_ch))
      } else {
        (String::new(), String::new())
      };
      let prefix_at = if indent_command {
        Position::new(sel.start.line, start_ch)
      } else {
        sel.start
      };
      edits.push(EditDescriptor::insert(
        format!("{prefix}\n{prefix_indent}").as_str(),
        prefix_at,
      ));
      edits.push(if past_end {
        EditDescriptor::insert(format!("\n{suffix_indent}{suffix}").as_str(), buffer_end)
      } else {
        EditDescriptor::insert(
          format!("{suffix_indent}{suffix}\n").as_str(),
          Position::line_start(sel.end.line),
        )
      });
    } else {
      let prefix_at = if indent_command {
        Position::new(sel.start.line, start_ch)
      } else {
        sel.start
      };
      edits.push(EditDescriptor::insert(prefix, prefix_at));
      edits.push(EditDescriptor::insert(suffix, sel.end));
    }

    let adjust = |mut pos: Position| {
      if pos > sel.end {
        if complete_lines {
          pos.line += 1;
        } else if pos.line == sel.end.line {
          pos.ch += suffix_len;
        }
      }
      if pos >= sel.start {
        if complete_lines {
          pos.line += 1;
        } else if pos.line == sel.start.line && !(indent_command && pos.ch < start_ch) {
          pos.ch += prefix_len;
        }
      }
      pos
    };

    BatchEntry::new().with_edits(edits).track_all(tracked.iter().map(|tracked| {
      TrackedSelection::pre_adjusted(tracked.with_bounds(adjust(tracked.start), adjust(tracked.end)))
    }))
  }

  fn uncomment(
    &self,
    prefix_pos: Position,
    suffix_pos: Option<Position>,
    tracked: &[Selection],
  ) -> BatchEntry {
    let prefix_len = utf16_len(&self.block.start);
    let suffix_len = utf16_len(&self.block.end);
    let indent_line_comment = self.config.indent_line_comment;
    let alone_on_line = |line: usize, len: usize| {
      utf16_len(line_text(self.text, line).trim_matches(char_is_whitespace)) == len
    };

    let prefix_alone = alone_on_line(prefix_pos.line, prefix_len);
    let prefix_at_start = prefix_pos.ch == 0 && prefix_alone;
    let prefix_indented = indent_line_comment && prefix_alone;
    let (suffix_at_start, suffix_indented) = suffix_pos.map_or((false, false), |pos| {
      let alone = alone_on_line(pos.line, suffix_len);
      (pos.ch == 0 && alone, indent_line_comment && alone)
    });
    let whole_lines = prefix_at_start && suffix_at_start;

    let mut entry = BatchEntry::new();
    if let Some(pos) = suffix_pos {
      entry.edits.push(if suffix_indented {
        EditDescriptor::delete(Position::line_start(pos.line), Position::line_start(pos.line + 1))
      } else if whole_lines {
        EditDescriptor::delete(pos, Position::line_start(pos.line + 1))
      } else {
        EditDescriptor::delete(pos, Position::new(pos.line, pos.ch + suffix_len))
      });
    }
    entry.edits.push(if prefix_indented {
      EditDescriptor::delete(
        Position::line_start(prefix_pos.line),
        Position::line_start(prefix_pos.line + 1),
      )
    } else if whole_lines {
      EditDescriptor::delete(prefix_pos, Position::line_start(prefix_pos.line + 1))
    } else {
      EditDescriptor::delete(prefix_pos, Position::new(prefix_pos.line, prefix_pos.ch + prefix_len))
    });

    entry.track_all(tracked.iter().copied().map(TrackedSelection::new))
  }
}

/// Walks back from `cursor` over line comments and reports whether the
/// comment token it stops on belongs to an open block comment.
fn is_prev_token_block_comment(
  cursor: &mut TokenCursor,
  prefix: &str,
  suffix: &str,
  matchers: &LineMatchers,
) -> bool {
  // Flipped every time a delimiter could be either an opener or a closer.
  let mut negate = false;
  loop {
    let mut result = cursor.skip_whitespace(Direction::Backward);
    while result && matchers.matches(&cursor.token().text) {
      result = cursor.skip_whitespace(Direction::Backward);
    }
    if !result || cursor.token().kind != TokenKind::Comment {
      return negate;
    }

    let token = cursor.token();
    let opens = token.text.starts_with(prefix);
    let closes = token.text.ends_with(suffix);
    if !opens && !closes {
      return !negate;
    }
    if prefix == suffix && token.text == prefix {
      negate = !negate;
      continue;
    }
    return opens != negate;
  }
}

#[cfg(test)]
mod test {
  use ropey::Rope;

  use super::*;
  use crate::{
    batch::resolve_batch,
    language::LanguageRegistry,
    selection::SelectionSet,
  };

  fn pos(line: usize, ch: usize) -> Position {
    Position::new(line, ch)
  }

  fn cursor(line: usize, ch: usize) -> Selection {
    Selection::cursor(pos(line, ch))
  }

  fn range(start: (usize, usize), end: (usize, usize)) -> Selection {
    Selection::new(start.into(), end.into())
  }

  type Toggle = fn(RopeSlice, &Language, &EditorConfig, &[Selection]) -> EditBatch;

  fn toggle_with(
    toggle: Toggle,
    config: &EditorConfig,
    text: &str,
    language: &str,
    selections: &[Selection],
  ) -> (String, Vec<Selection>) {
    let registry = LanguageRegistry::builtin();
    let language = registry.get_or_plain(language);
    let rope = Rope::from(text);
    let batch = toggle(rope.slice(..), language, config, selections);
    let outcome = resolve_batch(&rope, &batch).unwrap();
    let after = outcome.changes.apply_to(&rope).unwrap();
    let selections = SelectionSet::new(outcome.selections).as_slice().to_vec();
    (after.to_string(), selections)
  }

  fn toggle(
    toggle: Toggle,
    text: &str,
    language: &str,
    selections: &[Selection],
  ) -> (String, Vec<Selection>) {
    toggle_with(toggle, &EditorConfig::default(), text, language, selections)
  }

  fn bounds(selections: &[Selection]) -> Vec<(Position, Position)> {
    selections.iter().map(|sel| (sel.start, sel.end)).collect()
  }

  #[test]
  fn empty_prefix_in_the_table_is_never_inserted() {
    let registry = LanguageRegistry::from_toml(
      r###"
      [[language]]
      name = "conf"
      line-comment = ["", "#"]
      "###,
    )
    .unwrap();
    let rope = Rope::from("key = 1");
    let batch = toggle_line_comment(
      rope.slice(..),
      registry.get_or_plain("conf"),
      &EditorConfig::default(),
      &[cursor(0, 0)],
    );
    let outcome = resolve_batch(&rope, &batch).unwrap();
    assert_eq!(outcome.changes.apply_to(&rope).unwrap(), "#key = 1");
  }

  mod matchers {
    use super::*;

    #[test]
    fn block_opener_is_not_a_line_comment() {
      let prefixes = vec!["--".to_string()];
      let matchers = LineMatchers::new(&prefixes, Some("--[["), Some("]]"));
      assert!(matchers.matches("-- note"));
      assert!(matchers.matches("   --"));
      assert!(matchers.matches("--[ x"));
      assert!(!matchers.matches("--[[ x"));
      assert!(!matchers.matches("x -- y"));
    }

    #[test]
    fn longest_prefix_wins() {
      let prefixes = vec!["#".to_string(), "##".to_string()];
      let matchers = LineMatchers::new(&prefixes, None, None);
      assert_eq!(matchers.line_prefix("  ## doc"), Some("##"));
      assert_eq!(matchers.line_prefix("# x"), Some("#"));
      assert_eq!(matchers.line_prefix("x"), None);
    }

    #[test]
    fn blank_lines_count_as_commented() {
      let prefixes = vec!["//".to_string()];
      let matchers = LineMatchers::new(&prefixes, Some("/*"), Some("*/"));
      let text = Rope::from("// a\n   \n// b\nc");
      assert!(!matchers.contains_uncommented(text.slice(..), 0, 2));
      assert!(matchers.contains_uncommented(text.slice(..), 0, 3));
    }
  }

  mod line {
    use super::*;

    #[test]
    fn comment_and_uncomment_cursors() {
      let sels = [cursor(0, 3), cursor(1, 0).with_primary(true)];
      let (text, sels) = toggle(toggle_line_comment, "foo();\nbar();", "javascript", &sels);
      assert_eq!(text, "//foo();\n//bar();");
      assert_eq!(bounds(&sels), vec![(pos(0, 5), pos(0, 5)), (pos(1, 2), pos(1, 2))]);
      assert!(sels[1].primary);

      let (text, sels) = toggle(toggle_line_comment, &text, "javascript", &sels);
      assert_eq!(text, "foo();\nbar();");
      assert_eq!(bounds(&sels), vec![(pos(0, 3), pos(0, 3)), (pos(1, 0), pos(1, 0))]);
    }

    #[test]
    fn mixed_lines_are_commented() {
      let sels = [range((0, 0), (1, 1))];
      let (text, sels) = toggle(toggle_line_comment, "//a\nb", "javascript", &sels);
      assert_eq!(text, "////a\n//b");
      assert_eq!(bounds(&sels), vec![(pos(0, 0), pos(1, 3))]);
    }

    #[test]
    fn full_line_range_keeps_its_shape() {
      let sels = [range((0, 0), (1, 0))];
      let (text, sels) = toggle(toggle_line_comment, "foo();\nbar();", "javascript", &sels);
      assert_eq!(text, "//foo();\nbar();");
      assert_eq!(bounds(&sels), vec![(pos(0, 0), pos(1, 0))]);

      let (text, sels) = toggle(toggle_line_comment, &text, "javascript", &sels);
      assert_eq!(text, "foo();\nbar();");
      assert_eq!(bounds(&sels), vec![(pos(0, 0), pos(1, 0))]);
    }

    #[test]
    fn cursors_on_one_line_edit_once() {
      let sels = [cursor(0, 1), cursor(0, 3)];
      let (text, sels) = toggle(toggle_line_comment, "abcd\nx", "rust", &sels);
      assert_eq!(text, "//abcd\nx");
      assert_eq!(bounds(&sels), vec![(pos(0, 3), pos(0, 3)), (pos(0, 5), pos(0, 5))]);
    }

    #[test]
    fn uncomment_uses_the_matching_prefix() {
      let sels = [range((0, 0), (1, 4))];
      let (text, _) = toggle(toggle_line_comment, "# a\n// b", "php", &sels);
      assert_eq!(text, " a\n b");
    }

    #[test]
    fn indented_comments_follow_the_least_indented_line() {
      let config = EditorConfig {
        indent_line_comment: true,
        ..Default::default()
      };
      let sels = [range((0, 0), (1, 3))];
      let (text, _) = toggle_with(toggle_line_comment, &config, "    a\n  b", "javascript", &sels);
      assert_eq!(text, "    //a\n  //b");
    }

    #[test]
    fn block_only_language_wraps_the_line() {
      let (text, sels) = toggle(toggle_line_comment, "a {}\nb {}", "css", &[cursor(0, 1)]);
      assert_eq!(text, "/*a {}*/\nb {}");
      assert_eq!(bounds(&sels), vec![(pos(0, 3), pos(0, 3))]);

      let (text, sels) = toggle(toggle_line_comment, &text, "css", &sels);
      assert_eq!(text, "a {}\nb {}");
      assert_eq!(bounds(&sels), vec![(pos(0, 1), pos(0, 1))]);
    }

    #[test]
    fn plain_text_is_left_alone() {
      let (text, sels) = toggle(toggle_line_comment, "abc", "plain", &[cursor(0, 2)]);
      assert_eq!(text, "abc");
      assert_eq!(bounds(&sels), vec![(pos(0, 2), pos(0, 2))]);
    }
  }

  mod block {
    use super::*;

    #[test]
    fn cursor_lands_between_delimiters() {
      let (text, sels) = toggle(toggle_block_comment, "ab", "javascript", &[cursor(0, 1)]);
      assert_eq!(text, "a/**/b");
      assert_eq!(bounds(&sels), vec![(pos(0, 3), pos(0, 3))]);
    }

    #[test]
    fn removes_the_surrounding_comment_only() {
      let sels = [range((0, 2), (0, 9))];
      let (text, sels) = toggle(toggle_block_comment, "a /* b */ c", "javascript", &sels);
      assert_eq!(text, "a  b  c");
      assert_eq!(bounds(&sels), vec![(pos(0, 2), pos(0, 5))]);

      let (text, _) = toggle(toggle_block_comment, &text, "javascript", &sels);
      assert_eq!(text, "a /* b */ c");
    }

    #[test]
    fn whole_lines_get_delimiter_lines() {
      let sels = [range((0, 0), (2, 0))];
      let (text, sels) = toggle(toggle_block_comment, "a\nb\nc", "javascript", &sels);
      assert_eq!(text, "/*\na\nb\n*/\nc");
      assert_eq!(bounds(&sels), vec![(pos(1, 0), pos(3, 0))]);

      let (text, sels) = toggle(toggle_block_comment, &text, "javascript", &sels);
      assert_eq!(text, "a\nb\nc");
      assert_eq!(bounds(&sels), vec![(pos(0, 0), pos(2, 0))]);
    }

    #[test]
    fn second_comment_in_selection_is_a_no_op() {
      let sels = [range((0, 3), (0, 17))];
      let (text, after) = toggle(toggle_block_comment, "/* a */ b /* c */", "javascript", &sels);
      assert_eq!(text, "/* a */ b /* c */");
      assert_eq!(bounds(&after), bounds(&sels));
    }

    #[test]
    fn line_comment_is_toggled_as_a_line() {
      let (text, sels) = toggle(toggle_block_comment, "// a\nb", "javascript", &[cursor(0, 2)]);
      assert_eq!(text, " a\nb");
      assert_eq!(bounds(&sels), vec![(pos(0, 0), pos(0, 0))]);
    }

    #[test]
    fn language_without_block_syntax_passes_through() {
      let registry = LanguageRegistry::builtin();
      let plain = registry.get_or_plain("plain");
      let rope = Rope::from("abc");
      let batch = toggle_block_comment(rope.slice(..), plain, &EditorConfig::default(), &[cursor(0, 1)]);
      assert!(!batch.has_edits());
      assert_eq!(batch.entries().len(), 1);
    }
  }

  quickcheck::quickcheck! {
    fn line_comment_twice_restores(lines: Vec<String>, line: usize, ch: usize) -> bool {
      let lines: Vec<String> = lines
        .into_iter()
        .map(|line| {
          let body: String = line.chars().filter(|ch| ch.is_alphanumeric() || *ch == ' ').collect();
          format!("x{body}")
        })
        .collect();
      if lines.is_empty() {
        return true;
      }
      let text = lines.join("\n");
      let line = line % lines.len();
      // Columns on char boundaries; a column inside a surrogate pair clamps.
      let chars = lines[line].chars().count();
      let ch = lines[line].chars().take(ch % (chars + 1)).map(char::len_utf16).sum();
      let sels = [cursor(line, ch)];

      let (commented, after) = toggle(toggle_line_comment, &text, "javascript", &sels);
      let (restored, after) = toggle(toggle_line_comment, &commented, "javascript", &after);
      restored == text && bounds(&after) == bounds(&sels)
    }
  }
}
