//! One visual instance of a document.
//!
//! The owner of a document reads the buffer directly. Every other view is a
//! mirror with its own presentation of the text, which is kept in step with
//! the buffer one change at a time. The [`SyncState`] guard makes sure a
//! change travelling between a mirror and the buffer is applied exactly once
//! on each side.

use std::{
  cell::RefCell,
  collections::BTreeSet,
  rc::Rc,
};

use ropey::{
  Rope,
  RopeSlice,
};
use smallvec::SmallVec;

use crate::{
  config::EditorConfig,
  document::{
    Document,
    DocumentChange,
    DocumentHandle,
    DocumentId,
    ViewId,
  },
  lines::LineBounds,
  position::{
    Position,
    clip_position,
    line_count,
  },
  selection::{
    Selection,
    SelectionSet,
  },
  visible_range::VisibleRange,
  widget::{
    WidgetHost,
    WidgetId,
  },
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
  /// A regular editor; may own its document.
  #[default]
  Full,
  /// Embedded in another view, usually restricted to a few lines.
  Inline,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
  #[default]
  Idle,
  /// Applying a buffer change to the presentation.
  SyncingFromOwner,
  /// Forwarding a local edit to the buffer.
  SyncingToOwner,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
  pub kind:  ViewKind,
  /// Inclusive `(start_line, end_line)` the view is restricted to.
  pub range: Option<(usize, usize)>,
}

impl ViewOptions {
  pub fn full() -> Self {
    Self::default()
  }

  pub fn inline(start_line: usize, end_line: usize) -> Self {
    Self {
      kind:  ViewKind::Inline,
      range: Some((start_line, end_line)),
    }
  }
}

/// What a buffer change did to a view beyond its text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ViewUpdate {
  pub lost_content:  bool,
  pub moved_widgets: Vec<WidgetId>,
}

#[derive(Debug)]
pub struct View {
  id:            ViewId,
  handle:        DocumentHandle,
  kind:          ViewKind,
  /// `None` while the view owns the document.
  presentation:  Option<Rope>,
  selections:    SelectionSet,
  visible_range: Option<VisibleRange>,
  hidden:        SmallVec<[(usize, usize); 2]>,
  widgets:       WidgetHost,
  sync:          SyncState,
  config:        EditorConfig,
  sync_updates:  usize,
  lost:          bool,
}

impl View {
  pub(crate) fn new(
    id: ViewId,
    doc: &Rc<RefCell<Document>>,
    options: ViewOptions,
    config: EditorConfig,
  ) -> Self {
    let handle = DocumentHandle::acquire(doc);
    let (presentation, last) = {
      let doc = handle.borrow();
      (doc.text().clone(), doc.line_count().saturating_sub(1))
    };
    let visible_range = options
      .range
      .map(|(start, end)| VisibleRange::new(doc, start.min(last), end.min(last)));
    let cursor = visible_range
      .as_ref()
      .and_then(VisibleRange::start_line)
      .map_or_else(Position::zero, Position::line_start);

    let mut view = Self {
      id,
      handle,
      kind: options.kind,
      presentation: Some(presentation),
      selections: SelectionSet::single(Selection::cursor(cursor)),
      visible_range,
      hidden: SmallVec::new(),
      widgets: WidgetHost::new(),
      sync: SyncState::Idle,
      config,
      sync_updates: 0,
      lost: false,
    };
    view.refresh_hidden();
    view
  }

  pub fn id(&self) -> ViewId {
    self.id
  }

  pub fn kind(&self) -> ViewKind {
    self.kind
  }

  pub fn document(&self) -> DocumentId {
    self.handle.id()
  }

  pub(crate) fn shared_document(&self) -> &Rc<RefCell<Document>> {
    self.handle.shared()
  }

  pub fn is_owner(&self) -> bool {
    self.handle.borrow().owner() == Some(self.id)
  }

  /// The text as this view shows it.
  pub fn text(&self) -> Rope {
    match &self.presentation {
      Some(presentation) => presentation.clone(),
      None => self.handle.borrow().text().clone(),
    }
  }

  pub fn selections(&self) -> &SelectionSet {
    &self.selections
  }

  /// Replaces the selections, clipped to the text.
  pub fn set_selections(&mut self, selections: impl IntoIterator<Item = Selection>) {
    let text = self.text();
    let slice = text.slice(..);
    self.selections = SelectionSet::new(selections.into_iter().map(|sel| {
      sel.with_bounds(clip_position(slice, sel.start), clip_position(slice, sel.end))
    }));
  }

  pub fn visible_range(&self) -> Option<&VisibleRange> {
    self.visible_range.as_ref()
  }

  /// Lines that are hidden, as inclusive runs.
  pub fn hidden_lines(&self) -> &[(usize, usize)] {
    &self.hidden
  }

  /// Lines commands may touch.
  pub fn line_bounds(&self) -> LineBounds {
    match self.visible_range.as_ref().and_then(VisibleRange::bounds) {
      Some(bounds) => bounds,
      None => LineBounds::of(self.text().slice(..)),
    }
  }

  pub fn widgets(&self) -> &WidgetHost {
    &self.widgets
  }

  pub(crate) fn widgets_mut(&mut self) -> &mut WidgetHost {
    &mut self.widgets
  }

  pub fn sync_state(&self) -> SyncState {
    self.sync
  }

  pub fn config(&self) -> &EditorConfig {
    &self.config
  }

  pub(crate) fn set_config(&mut self, config: EditorConfig) {
    self.config = config;
  }

  /// Presentation-only updates received from the buffer.
  pub fn sync_updates(&self) -> usize {
    self.sync_updates
  }

  /// The visible range could no longer be resolved. The view takes no more
  /// edits and should be disposed.
  pub fn is_lost(&self) -> bool {
    self.lost
  }

  /// Drops the presentation once the view owns the buffer.
  pub(crate) fn promote(&mut self) {
    if self.presentation.take().is_some() {
      tracing::debug!(view = ?self.id, "view now reads the buffer directly");
    }
  }

  /// Enters `state` unless a sync is already running.
  pub(crate) fn begin_sync(&mut self, state: SyncState) -> bool {
    if self.sync != SyncState::Idle {
      return false;
    }
    tracing::trace!(view = ?self.id, ?state, "sync started");
    self.sync = state;
    true
  }

  pub(crate) fn end_sync(&mut self) {
    tracing::trace!(view = ?self.id, state = ?self.sync, "sync finished");
    self.sync = SyncState::Idle;
  }

  /// Applies this view's own edit to its presentation while the edit is
  /// forwarded to the buffer.
  pub(crate) fn apply_local(&mut self, change: &DocumentChange) {
    if let Some(presentation) = self.presentation.as_mut() {
      if let Err(err) = change.changes.apply(presentation) {
        tracing::warn!(view = ?self.id, %err, "presentation out of step, reloading it");
        *presentation = self.handle.borrow().text().clone();
      }
    }
  }

  /// Reacts to a buffer change. `before` is the buffer text the change was
  /// applied to.
  pub(crate) fn receive(&mut self, change: &DocumentChange, before: RopeSlice) -> ViewUpdate {
    let mut update = ViewUpdate::default();
    if self.lost {
      tracing::trace!(view = ?self.id, "ignoring change, content lost");
      return update;
    }

    let range = self
      .visible_range
      .as_mut()
      .map(|range| range.apply_records(&change.records))
      .unwrap_or_default();

    if self.sync == SyncState::Idle {
      if let Some(presentation) = self.presentation.as_mut() {
        self.sync = SyncState::SyncingFromOwner;
        if let Err(err) = change.changes.apply(presentation) {
          tracing::warn!(view = ?self.id, %err, "presentation out of step, reloading it");
          *presentation = self.handle.borrow().text().clone();
        }
        self.sync_updates += 1;
        self.sync = SyncState::Idle;
      }
    } else {
      tracing::trace!(view = ?self.id, state = ?self.sync, "echo discarded");
    }

    let after = self.text();
    match self.selections.map(&change.changes, before, after.slice(..)) {
      Ok(mapped) => self.selections = mapped,
      Err(err) => {
        tracing::warn!(view = ?self.id, %err, "could not map selections");
        let fallback: Vec<Selection> = self.selections.iter().copied().collect();
        self.set_selections(fallback);
      },
    }

    if range.lost_sync {
      self.lost = true;
      update.lost_content = true;
      return update;
    }

    let mut moved: BTreeSet<WidgetId> = BTreeSet::new();
    if self.sync == SyncState::Idle {
      moved.extend(self.refresh_hidden());
    }
    moved.extend(self.widgets.apply_records(&change.records));
    update.moved_widgets = moved.into_iter().collect();
    update
  }

  /// Recomputes the hidden lines. Returns the widgets below the first line
  /// whose visibility changed.
  pub(crate) fn refresh_hidden(&mut self) -> Vec<WidgetId> {
    let hidden = match &self.visible_range {
      Some(range) => range.hidden_lines(line_count(self.text().slice(..))),
      None => SmallVec::new(),
    };
    if hidden == self.hidden {
      return Vec::new();
    }

    let first_changed = hidden
      .iter()
      .filter(|run| !self.hidden.contains(run))
      .chain(self.hidden.iter().filter(|run| !hidden.contains(run)))
      .map(|&(first, _)| first)
      .min();
    self.hidden = hidden;
    first_changed.map_or_else(Vec::new, |line| self.widgets.notify_after(line))
  }

  /// Tears the view down. Returns the owner of the document afterwards.
  pub(crate) fn dispose(self) -> Option<ViewId> {
    let Self {
      id,
      handle,
      presentation,
      visible_range,
      mut widgets,
      ..
    } = self;
    let doc = Rc::clone(handle.shared());
    tracing::debug!(view = ?id, document = ?handle.id(), "disposing view");

    drop(presentation);
    drop(handle);
    doc.borrow_mut().detach_listener(id);
    if let Some(range) = visible_range {
      range.dispose();
    }
    // Disconnects even when a widget panics while closing.
    let disconnect = Disconnect {
      doc,
      view: id,
      done: false,
    };
    widgets.close_all();

    disconnect.finish()
  }
}

struct Disconnect {
  doc:  Rc<RefCell<Document>>,
  view: ViewId,
  done: bool,
}

impl Disconnect {
  fn finish(mut self) -> Option<ViewId> {
    self.done = true;
    let owner = self.doc.borrow_mut().disconnect_view(self.view);
    owner
  }
}

impl Drop for Disconnect {
  fn drop(&mut self) {
    if self.done {
      return;
    }
    if let Ok(mut doc) = self.doc.try_borrow_mut() {
      doc.disconnect_view(self.view);
    }
  }
}

#[cfg(test)]
mod test {
  use std::num::NonZeroUsize;

  use super::*;
  use crate::{
    document::DocumentId,
    transaction::ChangeSet,
  };

  fn shared(text: &str) -> Rc<RefCell<Document>> {
    let id = DocumentId::new(NonZeroUsize::MIN);
    Rc::new(RefCell::new(Document::new(id, text, "plain")))
  }

  fn view_id(n: usize) -> ViewId {
    ViewId::new(NonZeroUsize::new(n).unwrap())
  }

  #[test]
  fn mirrors_follow_the_buffer() {
    let doc = shared("one\ntwo");
    let mut view = View::new(view_id(1), &doc, ViewOptions::full(), EditorConfig::default());
    let before = doc.borrow().text().clone();
    let changes = ChangeSet::change(&before, [(0, 0, Some(">".into()))]).unwrap();
    let change = doc.borrow_mut().apply_changes(changes, None).unwrap();

    let update = view.receive(&change, before.slice(..));
    assert_eq!(view.text().to_string(), ">one\ntwo");
    assert_eq!(view.sync_updates(), 1);
    assert!(!update.lost_content);
    assert_eq!(view.selections().as_slice()[0].start, Position::new(0, 1));
  }

  #[test]
  fn echo_is_discarded_while_syncing() {
    let doc = shared("one");
    let mut view = View::new(view_id(1), &doc, ViewOptions::full(), EditorConfig::default());
    let before = doc.borrow().text().clone();
    let changes = ChangeSet::change(&before, [(3, 3, Some("!".into()))]).unwrap();

    assert!(view.begin_sync(SyncState::SyncingToOwner));
    assert!(!view.begin_sync(SyncState::SyncingFromOwner));
    let change = doc.borrow_mut().apply_changes(changes, Some(view.id())).unwrap();
    view.apply_local(&change);
    view.receive(&change, before.slice(..));
    view.end_sync();

    assert_eq!(view.text().to_string(), "one!");
    assert_eq!(view.sync_updates(), 0);
  }

  #[test]
  fn owner_reads_the_buffer() {
    let doc = shared("a");
    let mut view = View::new(view_id(1), &doc, ViewOptions::full(), EditorConfig::default());
    doc.borrow_mut().ensure_owner(view.id()).unwrap();
    view.promote();
    assert!(view.is_owner());

    let before = doc.borrow().text().clone();
    let changes = ChangeSet::change(&before, [(1, 1, Some("b".into()))]).unwrap();
    let change = doc.borrow_mut().apply_changes(changes, None).unwrap();
    view.receive(&change, before.slice(..));
    assert_eq!(view.text().to_string(), "ab");
    assert_eq!(view.sync_updates(), 0);
  }

  #[test]
  fn inline_views_hide_lines_outside_their_range() {
    let doc = shared("a\nb\nc\nd");
    let view = View::new(
      view_id(1),
      &doc,
      ViewOptions::inline(1, 2),
      EditorConfig::default(),
    );
    assert_eq!(view.hidden_lines(), &[(0, 0), (3, 3)]);
    assert_eq!(view.line_bounds(), LineBounds::new(1, 2));
    assert_eq!(view.selections().as_slice()[0].start, Position::new(1, 0));
    // The view and its visible range each hold a reference.
    assert_eq!(doc.borrow().ref_count(), 2);

    view.dispose();
    assert_eq!(doc.borrow().ref_count(), 0);
    assert!(doc.borrow().listeners().is_empty());
  }
}
