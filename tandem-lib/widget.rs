//! Widgets hosted between the lines of a view.
//!
//! A widget is anchored to a line and pushes every line below it down by
//! its height. Whenever something above a widget changes height (a widget is
//! added, removed or resized, lines are inserted or removed) the widgets
//! below it are told their offset changed. Widgets at or above the change
//! are left alone.
//!
//! Every widget gets exactly one `on_closed` call: when it is removed, when
//! its anchor line is deleted, or when the host goes away.

use std::{
  collections::BTreeSet,
  fmt,
  num::NonZeroUsize,
};

use crate::document::ChangeRecord;

pub trait InlineWidget: fmt::Debug {
  fn height(&self) -> usize;

  fn on_added(&mut self) {}

  fn on_offset_top_changed(&mut self) {}

  /// Last call the widget gets. References it holds should be released
  /// here.
  fn on_closed(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(NonZeroUsize);

impl WidgetId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

#[derive(Debug)]
struct Hosted {
  id:     WidgetId,
  line:   usize,
  height: usize,
  widget: Box<dyn InlineWidget>,
}

#[derive(Debug)]
pub struct WidgetHost {
  /// Sorted by line, then by insertion.
  widgets: Vec<Hosted>,
  next_id: NonZeroUsize,
}

impl Default for WidgetHost {
  fn default() -> Self {
    Self::new()
  }
}

impl WidgetHost {
  pub fn new() -> Self {
    Self {
      widgets: Vec::new(),
      next_id: NonZeroUsize::MIN,
    }
  }

  pub fn len(&self) -> usize {
    self.widgets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.widgets.is_empty()
  }

  pub fn ids(&self) -> impl Iterator<Item = WidgetId> + '_ {
    self.widgets.iter().map(|hosted| hosted.id)
  }

  pub fn line_of(&self, id: WidgetId) -> Option<usize> {
    self.find(id).map(|idx| self.widgets[idx].line)
  }

  pub fn height_of(&self, id: WidgetId) -> Option<usize> {
    self.find(id).map(|idx| self.widgets[idx].height)
  }

  fn find(&self, id: WidgetId) -> Option<usize> {
    self.widgets.iter().position(|hosted| hosted.id == id)
  }

  /// Hosts `widget` under `line`, replacing whatever was hosted there.
  /// Returns the new id and the widgets whose offset changed.
  pub fn add(&mut self, line: usize, widget: Box<dyn InlineWidget>) -> (WidgetId, Vec<WidgetId>) {
    let replaced: Vec<WidgetId> = self
      .widgets
      .iter()
      .filter(|hosted| hosted.line == line)
      .map(|hosted| hosted.id)
      .collect();
    for id in replaced {
      self.close(id);
    }

    let id = WidgetId::new(self.next_id);
    self.next_id = self.next_id.saturating_add(1);
    let height = widget.height();
    let idx = self.widgets.partition_point(|hosted| hosted.line <= line);
    self.widgets.insert(idx, Hosted {
      id,
      line,
      height,
      widget,
    });
    self.widgets[idx].widget.on_added();
    tracing::trace!(?id, line, height, "widget added");

    (id, self.notify_after(line))
  }

  /// Closes and removes `id`. Returns the widgets whose offset changed, or
  /// `None` when `id` is not hosted here.
  pub fn remove(&mut self, id: WidgetId) -> Option<Vec<WidgetId>> {
    let line = self.close(id)?;
    Some(self.notify_after(line))
  }

  /// Records a new height for `id`. Returns the widgets below it, which are
  /// notified when the height actually changed.
  pub fn set_height(&mut self, id: WidgetId, height: usize) -> Vec<WidgetId> {
    let Some(idx) = self.find(id) else {
      return Vec::new();
    };
    let hosted = &mut self.widgets[idx];
    if hosted.height == height {
      return Vec::new();
    }
    hosted.height = height;
    let line = hosted.line;
    self.notify_after(line)
  }

  /// Tells every widget anchored below `line` that its offset changed.
  pub fn notify_after(&mut self, line: usize) -> Vec<WidgetId> {
    self
      .widgets
      .iter_mut()
      .filter(|hosted| hosted.line > line)
      .map(|hosted| {
        hosted.widget.on_offset_top_changed();
        hosted.id
      })
      .collect()
  }

  /// Moves anchors through `records` (in the order they were applied).
  /// Widgets whose anchor line was deleted are closed. Returns the widgets
  /// whose offset changed.
  pub fn apply_records(&mut self, records: &[ChangeRecord]) -> Vec<WidgetId> {
    let mut moved = BTreeSet::new();
    for record in records {
      let (from, to) = (record.from.line, record.to.line);
      let deleted: Vec<WidgetId> = self
        .widgets
        .iter()
        .filter(|hosted| hosted.line > from && hosted.line <= to)
        .map(|hosted| hosted.id)
        .collect();
      for id in deleted {
        tracing::trace!(?id, "anchor line deleted, closing widget");
        self.close(id);
        moved.remove(&id);
      }

      let added = record.lines_added();
      if added == 0 {
        continue;
      }
      for hosted in &mut self.widgets {
        if hosted.line > to {
          hosted.line = hosted.line.saturating_add_signed(added);
        }
        if hosted.line > from {
          moved.insert(hosted.id);
        }
      }
    }

    let mut notified = Vec::with_capacity(moved.len());
    for hosted in &mut self.widgets {
      if moved.contains(&hosted.id) {
        hosted.widget.on_offset_top_changed();
        notified.push(hosted.id);
      }
    }
    notified
  }

  /// Closes every widget, in line order. A widget is out of the host before
  /// its `on_closed` runs, so if that panics the host's `Drop` closes the
  /// rest.
  pub fn close_all(&mut self) {
    while !self.widgets.is_empty() {
      let mut hosted = self.widgets.remove(0);
      hosted.widget.on_closed();
    }
  }

  fn close(&mut self, id: WidgetId) -> Option<usize> {
    let idx = self.find(id)?;
    let mut hosted = self.widgets.remove(idx);
    hosted.widget.on_closed();
    Some(hosted.line)
  }
}

impl Drop for WidgetHost {
  fn drop(&mut self) {
    self.close_all();
  }
}
