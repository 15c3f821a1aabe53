//! Editing commands and how they turn into edits.
//!
//! [`plan`] looks at one snapshot of a view (its text, selections and
//! visible lines) and decides what a command does, without touching
//! anything. The workspace then carries the plan out.

use ropey::Rope;

use crate::{
  batch::{
    self,
    BatchOutcome,
    EditBatch,
  },
  comment::{
    toggle_block_comment,
    toggle_line_comment,
  },
  config::EditorConfig,
  language::Language,
  lines::{
    Direction,
    LineBounds,
    add_cursors,
    delete_lines,
    duplicate_selections,
    move_lines,
    open_lines,
    select_lines,
    split_into_lines,
  },
  navigation::NavigationIntent,
  selection::Selection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
  ToggleLineComment,
  ToggleBlockComment,
  MoveLine(Direction),
  DuplicateSelection,
  OpenLine(Direction),
  SelectLine,
  SplitSelectionIntoLines,
  AddCursor(Direction),
  DeleteLines,
  Navigate(NavigationIntent),
}

impl Command {
  /// Whether the command can change the buffer.
  pub fn edits(self) -> bool {
    match self {
      Self::SelectLine | Self::SplitSelectionIntoLines | Self::AddCursor(_) => false,
      Self::Navigate(intent) => intent.deletes(),
      _ => true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
  /// Nothing to do.
  Noop,
  SelectionsChanged,
  /// The buffer changed and is now at `version`.
  Edited { version: usize },
}

/// Everything a command may look at.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
  pub text:       &'a Rope,
  pub language:   &'a Language,
  pub config:     &'a EditorConfig,
  /// Sorted, as a view keeps them.
  pub selections: &'a [Selection],
  pub bounds:     LineBounds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
  /// A batch for the buffer to resolve.
  Edit(EditBatch),
  /// Changes already resolved against the snapshot, with the selections
  /// that go with them.
  Resolved(BatchOutcome),
  /// New selections, no edit.
  Select(Vec<Selection>),
  Navigate(NavigationIntent),
}

/// Works out what `command` does in `cx`.
pub fn plan(command: Command, cx: &CommandContext) -> batch::Result<Plan> {
  let slice = cx.text.slice(..);
  let plan = match command {
    Command::ToggleLineComment => {
      Plan::Edit(toggle_line_comment(slice, cx.language, cx.config, cx.selections))
    },
    Command::ToggleBlockComment => {
      Plan::Edit(toggle_block_comment(slice, cx.language, cx.config, cx.selections))
    },
    Command::MoveLine(direction) => {
      Plan::Edit(move_lines(slice, cx.selections, direction, cx.bounds))
    },
    Command::DuplicateSelection => Plan::Edit(duplicate_selections(slice, cx.selections)),
    Command::DeleteLines => Plan::Edit(delete_lines(slice, cx.selections, cx.bounds)),
    Command::OpenLine(direction) => {
      Plan::Resolved(open_lines(
        cx.text,
        cx.selections,
        direction,
        cx.bounds,
        cx.config,
      )?)
    },
    Command::SelectLine => Plan::Select(select_lines(slice, cx.selections)),
    Command::SplitSelectionIntoLines => Plan::Select(split_into_lines(slice, cx.selections)),
    Command::AddCursor(direction) => {
      Plan::Select(add_cursors(
        slice,
        cx.selections,
        direction,
        cx.bounds,
        cx.config.tab_size,
      ))
    },
    Command::Navigate(intent) => Plan::Navigate(intent),
  };
  tracing::trace!(?command, "planned command");
  Ok(plan)
}
