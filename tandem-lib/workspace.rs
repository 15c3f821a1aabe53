//! Documents, the views bound to them and the edit pipeline between both.
//!
//! Every mutation goes through one path: the target view is checked, the
//! document gets an owner, the buffer is changed once and the change is
//! broadcast to every view listening on the document. A mirror forwarding
//! its own edit is marked as syncing for the duration, so the broadcast does
//! not apply the edit to it a second time.

use std::{
  borrow::Cow,
  cell::{
    Ref,
    RefCell,
  },
  collections::{
    BTreeMap,
    VecDeque,
  },
  num::NonZeroUsize,
  rc::Rc,
};

use ropey::Rope;
use tandem_core::chars::{
  char_closes_block,
  char_is_whitespace,
};
use thiserror::Error;

use crate::{
  batch::{
    BatchEntry,
    BatchError,
    BatchOutcome,
    EditBatch,
    EditDescriptor,
  },
  command::{
    Command,
    CommandContext,
    CommandOutcome,
    Plan,
    plan,
  },
  config::EditorConfig,
  document::{
    self,
    Document,
    DocumentChange,
    DocumentError,
    DocumentId,
    ViewId,
  },
  indent::reindent_line,
  language::LanguageRegistry,
  navigation::{
    NavigationBackend,
    navigate,
  },
  position::{
    Position,
    char_idx_at_position,
    line_text,
    position_at_char_idx,
    range_text,
  },
  selection::Selection,
  transaction::{
    Assoc,
    ChangeSet,
    TransactionError,
  },
  view::{
    SyncState,
    View,
    ViewKind,
    ViewOptions,
  },
  widget::{
    InlineWidget,
    WidgetId,
  },
};

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorkspaceError {
  #[error("no document {0:?}")]
  UnknownDocument(DocumentId),
  #[error("no view {0:?}")]
  UnknownView(ViewId),
  #[error("view {0:?} lost its content and takes no more edits")]
  ContentLost(ViewId),
  #[error("view {0:?} is in the middle of a sync")]
  SyncInProgress(ViewId),
  #[error(transparent)]
  Document(#[from] DocumentError),
  #[error(transparent)]
  Batch(#[from] BatchError),
  #[error(transparent)]
  Transaction(#[from] TransactionError),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Notifications for whoever hosts the views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceEvent {
  /// The view's visible range could not follow a change. The view should be
  /// disposed.
  LostContent { view: ViewId },
  OffsetTopChanged { view: ViewId, widget: WidgetId },
  ViewClosed { view: ViewId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferredTask {
  Reindent { view: ViewId, line: usize },
}

impl DeferredTask {
  fn view(self) -> ViewId {
    match self {
      Self::Reindent { view, .. } => view,
    }
  }
}

#[derive(Debug)]
pub struct Workspace {
  documents:        BTreeMap<DocumentId, Rc<RefCell<Document>>>,
  views:            BTreeMap<ViewId, View>,
  languages:        LanguageRegistry,
  config:           EditorConfig,
  focused:          Option<ViewId>,
  events:           Vec<WorkspaceEvent>,
  deferred:         VecDeque<DeferredTask>,
  next_document_id: NonZeroUsize,
  next_view_id:     NonZeroUsize,
}

impl Default for Workspace {
  fn default() -> Self {
    Self::new(EditorConfig::default(), LanguageRegistry::builtin())
  }
}

impl Workspace {
  pub fn new(config: EditorConfig, languages: LanguageRegistry) -> Self {
    Self {
      documents: BTreeMap::new(),
      views: BTreeMap::new(),
      languages,
      config,
      focused: None,
      events: Vec::new(),
      deferred: VecDeque::new(),
      next_document_id: NonZeroUsize::MIN,
      next_view_id: NonZeroUsize::MIN,
    }
  }

  pub fn config(&self) -> &EditorConfig {
    &self.config
  }

  /// Replaces the settings of the workspace and of every live view.
  pub fn set_config(&mut self, config: EditorConfig) {
    self.config = config;
    for view in self.views.values_mut() {
      view.set_config(config);
    }
    tracing::debug!(views = self.views.len(), "configuration updated");
  }

  pub fn languages(&self) -> &LanguageRegistry {
    &self.languages
  }

  pub fn open_document(&mut self, text: &str, language: &str) -> DocumentId {
    let id = DocumentId::new(self.next_document_id);
    self.next_document_id = self.next_document_id.saturating_add(1);
    self
      .documents
      .insert(id, Rc::new(RefCell::new(Document::new(id, text, language))));
    tracing::debug!(document = ?id, language, "opened document");
    id
  }

  pub fn document(&self, id: DocumentId) -> Option<Ref<'_, Document>> {
    self.documents.get(&id).map(|doc| doc.borrow())
  }

  /// The document itself, for collaborators that keep their own
  /// [`document::DocumentHandle`].
  pub fn shared_document(&self, id: DocumentId) -> Option<&Rc<RefCell<Document>>> {
    self.documents.get(&id)
  }

  pub fn attach_view(&mut self, doc: DocumentId, options: ViewOptions) -> Result<ViewId> {
    let shared = Rc::clone(
      self
        .documents
        .get(&doc)
        .ok_or(WorkspaceError::UnknownDocument(doc))?,
    );
    let id = ViewId::new(self.next_view_id);
    self.next_view_id = self.next_view_id.saturating_add(1);

    let mut view = View::new(id, &shared, options, self.config);
    {
      let mut doc = shared.borrow_mut();
      doc.attach_listener(id);
      if options.kind == ViewKind::Full {
        doc.associate_full_view(id);
        if doc.owner().is_none() && !doc.is_detached() {
          doc.ensure_owner(id)?;
        }
      }
    }
    if view.is_owner() {
      view.promote();
    }

    tracing::debug!(view = ?id, document = ?doc, kind = ?options.kind, "attached view");
    self.views.insert(id, view);
    if self.focused.is_none() {
      self.focused = Some(id);
    }
    Ok(id)
  }

  pub fn view(&self, id: ViewId) -> Option<&View> {
    self.views.get(&id)
  }

  pub fn views(&self) -> impl Iterator<Item = &View> {
    self.views.values()
  }

  fn view_mut(&mut self, id: ViewId) -> Result<&mut View> {
    self
      .views
      .get_mut(&id)
      .ok_or(WorkspaceError::UnknownView(id))
  }

  pub fn focus(&mut self, id: ViewId) -> Result<()> {
    if !self.views.contains_key(&id) {
      return Err(WorkspaceError::UnknownView(id));
    }
    self.focused = Some(id);
    Ok(())
  }

  pub fn focused_view(&self) -> Option<ViewId> {
    self.focused
  }

  /// Removes a view and releases everything it holds. When it owned its
  /// document, ownership moves on or the document detaches.
  pub fn dispose_view(&mut self, id: ViewId) -> Result<()> {
    let view = self
      .views
      .remove(&id)
      .ok_or(WorkspaceError::UnknownView(id))?;
    if self.focused == Some(id) {
      self.focused = None;
    }
    self.deferred.retain(|task| task.view() != id);

    let promote = PromoteOwner {
      views: &mut self.views,
      doc:   Rc::clone(view.shared_document()),
    };
    let owner = view.dispose();
    tracing::trace!(view = ?id, ?owner, "view disposed");
    drop(promote);
    self.events.push(WorkspaceEvent::ViewClosed { view: id });
    Ok(())
  }

  pub fn drain_events(&mut self) -> Vec<WorkspaceEvent> {
    std::mem::take(&mut self.events)
  }

  pub fn set_selections(
    &mut self,
    id: ViewId,
    selections: impl IntoIterator<Item = Selection>,
  ) -> Result<()> {
    self.view_mut(id)?.set_selections(selections);
    Ok(())
  }

  pub fn add_widget(
    &mut self,
    view: ViewId,
    line: usize,
    widget: Box<dyn InlineWidget>,
  ) -> Result<WidgetId> {
    let (widget, moved) = self.view_mut(view)?.widgets_mut().add(line, widget);
    self.push_moved(view, moved);
    Ok(widget)
  }

  /// Closes a widget. Returns whether the view hosted it.
  pub fn remove_widget(&mut self, view: ViewId, widget: WidgetId) -> Result<bool> {
    let moved = self.view_mut(view)?.widgets_mut().remove(widget);
    let removed = moved.is_some();
    self.push_moved(view, moved.unwrap_or_default());
    Ok(removed)
  }

  pub fn set_widget_height(&mut self, view: ViewId, widget: WidgetId, height: usize) -> Result<()> {
    let moved = self.view_mut(view)?.widgets_mut().set_height(widget, height);
    self.push_moved(view, moved);
    Ok(())
  }

  fn push_moved(&mut self, view: ViewId, widgets: Vec<WidgetId>) {
    self.events.extend(
      widgets
        .into_iter()
        .map(|widget| WorkspaceEvent::OffsetTopChanged { view, widget }),
    );
  }

  /// Applies an edit typed into `id`, expressed against the view's text.
  /// Returns the new document version.
  pub fn edit_view(&mut self, id: ViewId, changes: ChangeSet) -> Result<usize> {
    let ((), change) = self.mutate(id, |doc, origin| {
      Ok(((), doc.apply_changes(changes, Some(origin))?))
    })?;
    Ok(change.version)
  }

  /// The single mutation path. `apply` runs against the document once every
  /// check passed.
  fn mutate<T>(
    &mut self,
    id: ViewId,
    apply: impl FnOnce(&mut Document, ViewId) -> document::Result<(T, DocumentChange)>,
  ) -> Result<(T, DocumentChange)> {
    let view = self.view_mut(id)?;
    if view.is_lost() {
      tracing::warn!(view = ?id, "edit refused, view lost its content");
      return Err(WorkspaceError::ContentLost(id));
    }
    if view.sync_state() != SyncState::Idle {
      return Err(WorkspaceError::SyncInProgress(id));
    }

    let doc = Rc::clone(view.shared_document());
    let owner = doc.borrow_mut().ensure_owner(id).inspect_err(|_| {
      tracing::warn!(view = ?id, "edit refused, document is detached");
    })?;
    let mirror = owner != id;
    if mirror {
      view.begin_sync(SyncState::SyncingToOwner);
    } else {
      view.promote();
    }

    let before = doc.borrow().text().clone();
    let applied = {
      let mut doc = doc.borrow_mut();
      apply(&mut doc, id)
    };
    let (value, change) = match applied {
      Ok(applied) => applied,
      Err(err) => {
        if mirror {
          self.view_mut(id)?.end_sync();
        }
        return Err(err.into());
      },
    };

    if mirror {
      self.view_mut(id)?.apply_local(&change);
    }
    self.broadcast(&doc, &change, &before);
    if mirror {
      let view = self.view_mut(id)?;
      view.end_sync();
      let moved = view.refresh_hidden();
      self.push_moved(id, moved);
    }
    Ok((value, change))
  }

  /// Hands `change` to every view listening on `doc`.
  fn broadcast(&mut self, doc: &Rc<RefCell<Document>>, change: &DocumentChange, before: &Rope) {
    let listeners = doc.borrow().listeners().to_vec();
    tracing::trace!(document = ?change.document, views = listeners.len(), "broadcasting change");
    for id in listeners {
      let Some(view) = self.views.get_mut(&id) else {
        continue;
      };
      let update = view.receive(change, before.slice(..));
      if update.lost_content {
        tracing::warn!(view = ?id, "view lost its content");
        self.events.push(WorkspaceEvent::LostContent { view: id });
      }
      self.push_moved(id, update.moved_widgets);
    }
    self.remap_deferred(doc, change, before);
  }

  /// Keeps scheduled re-indents on the line they were scheduled for.
  fn remap_deferred(&mut self, doc: &Rc<RefCell<Document>>, change: &DocumentChange, before: &Rope) {
    let doc = doc.borrow();
    let after = doc.text();
    for task in &mut self.deferred {
      let DeferredTask::Reindent { view, line } = task;
      let view = *view;
      let on_document = self
        .views
        .get(&view)
        .is_some_and(|target| target.document() == change.document);
      if !on_document || *line >= before.len_lines() {
        continue;
      }
      let start = before.line_to_char(*line);
      if let Ok(mapped) = change.changes.map_pos(start, Assoc::After) {
        *line = after.char_to_line(mapped);
      }
    }
  }

  fn target(&self, view: Option<ViewId>) -> Result<Option<ViewId>> {
    match view {
      Some(id) if self.views.contains_key(&id) => Ok(Some(id)),
      Some(id) => Err(WorkspaceError::UnknownView(id)),
      None => Ok(self.focused),
    }
  }

  /// Runs `command` on `view`, or on the focused view.
  pub fn execute(&mut self, command: Command, view: Option<ViewId>) -> Result<CommandOutcome> {
    let Some(id) = self.target(view)? else {
      return Ok(CommandOutcome::Noop);
    };
    let target = self.view_mut(id)?;
    if target.selections().is_empty() {
      return Ok(CommandOutcome::Noop);
    }
    if target.is_lost() && command.edits() {
      return Err(WorkspaceError::ContentLost(id));
    }

    let planned = {
      let target = &self.views[&id];
      let text = target.text();
      let language = self
        .languages
        .get_or_plain(target.shared_document().borrow().language());
      let selections: Vec<Selection> = target.selections().iter().copied().collect();
      let cx = CommandContext {
        text: &text,
        language,
        config: target.config(),
        selections: &selections,
        bounds: target.line_bounds(),
      };
      plan(command, &cx)?
    };

    match planned {
      Plan::Edit(batch) => self.commit_batch(id, batch),
      Plan::Resolved(outcome) => self.commit_resolved(id, outcome),
      Plan::Select(selections) => {
        self.set_selections(id, selections)?;
        Ok(CommandOutcome::SelectionsChanged)
      },
      Plan::Navigate(intent) => {
        let mut navigator = ViewNavigator::new(self, id)?;
        navigate(&mut navigator, intent)?;
        Ok(navigator.outcome)
      },
    }
  }

  fn commit_batch(&mut self, id: ViewId, batch: EditBatch) -> Result<CommandOutcome> {
    if !batch.has_edits() {
      tracing::trace!(view = ?id, "batch has no edits");
      return Ok(CommandOutcome::Noop);
    }
    let tracked = batch.tracks_selections();
    let (outcome, change) = self.mutate(id, |doc, origin| doc.apply_edit_batch(&batch, Some(origin)))?;
    if tracked {
      self.view_mut(id)?.set_selections(outcome.selections);
    }
    Ok(CommandOutcome::Edited {
      version: change.version,
    })
  }

  fn commit_resolved(&mut self, id: ViewId, outcome: BatchOutcome) -> Result<CommandOutcome> {
    let BatchOutcome {
      changes,
      selections,
    } = outcome;
    let (selections, change) = self.mutate(id, move |doc, origin| {
      Ok((selections, doc.apply_changes(changes, Some(origin))?))
    })?;
    self.view_mut(id)?.set_selections(selections);
    Ok(CommandOutcome::Edited {
      version: change.version,
    })
  }

  /// Replaces every selection of the view with `text`. A closing bracket
  /// typed into leading whitespace schedules a re-indent of its line.
  pub fn type_text(&mut self, view: Option<ViewId>, text: &str) -> Result<CommandOutcome> {
    let Some(id) = self.target(view)? else {
      return Ok(CommandOutcome::Noop);
    };
    let target = self.view_mut(id)?;
    let selections: Vec<Selection> = target.selections().iter().copied().collect();
    if selections.is_empty() || (text.is_empty() && selections.iter().all(Selection::is_empty)) {
      return Ok(CommandOutcome::Noop);
    }

    let mut chars = text.chars();
    let closing = matches!((chars.next(), chars.next()), (Some(ch), None) if char_closes_block(ch));
    let mut reindent: Vec<usize> = Vec::new();
    if closing && target.config().smart_indent {
      let snapshot = target.text();
      let slice = snapshot.slice(..);
      for sel in &selections {
        let before = range_text(slice, Position::line_start(sel.start.line), sel.start);
        if before.chars().all(char_is_whitespace) {
          reindent.push(sel.start.line);
        }
      }
      reindent.dedup();
    }

    let batch: EditBatch = selections
      .iter()
      .map(|sel| BatchEntry::new().with_edit(EditDescriptor::replace(text, sel.start, sel.end)))
      .collect();
    let outcome = self.commit_batch(id, batch)?;
    for line in reindent {
      tracing::trace!(view = ?id, line, "re-indent scheduled");
      self.deferred.push_back(DeferredTask::Reindent { view: id, line });
    }
    Ok(outcome)
  }

  /// Runs the work scheduled by earlier edits. Returns how many tasks
  /// changed the buffer.
  pub fn run_deferred(&mut self) -> Result<usize> {
    let mut ran = 0;
    while let Some(task) = self.deferred.pop_front() {
      let DeferredTask::Reindent { view, line } = task;
      let Some(target) = self.views.get(&view) else {
        continue;
      };
      if target.is_lost() || target.sync_state() != SyncState::Idle {
        tracing::trace!(?view, "dropping deferred re-indent");
        continue;
      }
      let text = target.text();
      let Some(change) = reindent_line(text.slice(..), line, target.config()) else {
        continue;
      };
      let changes = ChangeSet::change(&text, [change])?;
      self.mutate(view, |doc, origin| {
        Ok(((), doc.apply_changes(changes, Some(origin))?))
      })?;
      ran += 1;
    }
    Ok(ran)
  }
}

/// Lets whichever view owns `doc` read the buffer directly once disposal of
/// another view is over, including when a widget panicked during it.
struct PromoteOwner<'a> {
  views: &'a mut BTreeMap<ViewId, View>,
  doc:   Rc<RefCell<Document>>,
}

impl Drop for PromoteOwner<'_> {
  fn drop(&mut self) {
    let owner = self.doc.try_borrow().ok().and_then(|doc| doc.owner());
    if let Some(view) = owner.and_then(|owner| self.views.get_mut(&owner)) {
      view.promote();
    }
  }
}

/// Moves and deletes through the selections of one view.
struct ViewNavigator<'a> {
  workspace:  &'a mut Workspace,
  view:       ViewId,
  config:     EditorConfig,
  text:       Rope,
  selections: Vec<Selection>,
  outcome:    CommandOutcome,
}

impl<'a> ViewNavigator<'a> {
  fn new(workspace: &'a mut Workspace, view: ViewId) -> Result<Self> {
    let target = workspace.view_mut(view)?;
    let config = *target.config();
    let text = target.text();
    let selections = target.selections().iter().copied().collect();
    Ok(Self {
      workspace,
      view,
      config,
      text,
      selections,
      outcome: CommandOutcome::Noop,
    })
  }
}

impl NavigationBackend for ViewNavigator<'_> {
  type Error = WorkspaceError;

  fn config(&self) -> &EditorConfig {
    &self.config
  }

  fn primary_cursor(&self) -> Option<Position> {
    self
      .selections
      .iter()
      .find(|sel| sel.primary)
      .map(Selection::head)
  }

  fn line_text(&self, line: usize) -> Cow<'_, str> {
    line_text(self.text.slice(..), line)
  }

  fn move_chars(&mut self, amount: isize) -> Result<()> {
    let slice = self.text.slice(..);
    let len = slice.len_chars();
    let moved: Vec<Selection> = self
      .selections
      .iter()
      .map(|sel| {
        let pos = if !sel.is_empty() {
          if amount < 0 { sel.start } else { sel.end }
        } else {
          let idx = char_idx_at_position(slice, sel.head());
          position_at_char_idx(slice, idx.saturating_add_signed(amount).min(len))
        };
        Selection::cursor(pos).with_primary(sel.primary)
      })
      .collect();
    self.workspace.set_selections(self.view, moved)?;
    self.outcome = CommandOutcome::SelectionsChanged;
    Ok(())
  }

  fn delete_chars(&mut self, amount: isize) -> Result<()> {
    let slice = self.text.slice(..);
    let len = slice.len_chars();
    let mut ranges: Vec<(usize, usize)> = self
      .selections
      .iter()
      .map(|sel| {
        if !sel.is_empty() {
          return (
            char_idx_at_position(slice, sel.start),
            char_idx_at_position(slice, sel.end),
          );
        }
        let idx = char_idx_at_position(slice, sel.head());
        if amount < 0 {
          (idx.saturating_sub(amount.unsigned_abs()), idx)
        } else {
          (idx, idx.saturating_add(amount.unsigned_abs()).min(len))
        }
      })
      .filter(|(from, to)| from < to)
      .collect();
    ranges.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (from, to) in ranges {
      match merged.last_mut() {
        Some(last) if last.1 >= from => last.1 = last.1.max(to),
        _ => merged.push((from, to)),
      }
    }

    let batch: EditBatch = merged
      .into_iter()
      .map(|(from, to)| {
        BatchEntry::new().with_edit(EditDescriptor::delete(
          position_at_char_idx(slice, from),
          position_at_char_idx(slice, to),
        ))
      })
      .collect();
    self.outcome = self.workspace.commit_batch(self.view, batch)?;
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::lines::Direction;

  fn cursor(line: usize, ch: usize) -> Selection {
    Selection::cursor(Position::new(line, ch))
  }

  fn insert(ws: &Workspace, view: ViewId, at: usize, text: &str) -> ChangeSet {
    let rope = ws.view(view).unwrap().text();
    ChangeSet::change(&rope, [(at, at, Some(text.into()))]).unwrap()
  }

  fn text(ws: &Workspace, view: ViewId) -> String {
    ws.view(view).unwrap().text().to_string()
  }

  mod sync {
    use super::*;

    #[test]
    fn first_full_view_owns() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("a", "plain");
      let inline = ws.attach_view(doc, ViewOptions::inline(0, 0)).unwrap();
      assert_eq!(ws.document(doc).unwrap().owner(), None);
      let full = ws.attach_view(doc, ViewOptions::full()).unwrap();
      assert_eq!(ws.document(doc).unwrap().owner(), Some(full));
      assert!(!ws.view(inline).unwrap().is_owner());
      assert_eq!(ws.focused_view(), Some(inline));
    }

    #[test]
    fn owner_edit_reaches_every_mirror_once() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("one\ntwo", "plain");
      let owner = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let mirror = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let inline = ws.attach_view(doc, ViewOptions::inline(1, 1)).unwrap();

      let changes = insert(&ws, owner, 0, "> ");
      assert_eq!(ws.edit_view(owner, changes).unwrap(), 1);

      assert_eq!(text(&ws, mirror), "> one\ntwo");
      assert_eq!(text(&ws, inline), "> one\ntwo");
      assert_eq!(ws.view(owner).unwrap().sync_updates(), 0);
      assert_eq!(ws.view(mirror).unwrap().sync_updates(), 1);
      assert_eq!(ws.view(inline).unwrap().sync_updates(), 1);
    }

    #[test]
    fn mirror_edit_is_not_echoed() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("one\ntwo", "plain");
      let owner = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let origin = ws.attach_view(doc, ViewOptions::inline(1, 1)).unwrap();
      let other = ws.attach_view(doc, ViewOptions::inline(0, 1)).unwrap();

      let changes = insert(&ws, origin, 7, "!");
      ws.edit_view(origin, changes).unwrap();

      assert_eq!(ws.document(doc).unwrap().version(), 1);
      assert_eq!(ws.document(doc).unwrap().text().to_string(), "one\ntwo!");
      assert_eq!(text(&ws, origin), "one\ntwo!");
      assert_eq!(text(&ws, other), "one\ntwo!");
      assert_eq!(ws.view(origin).unwrap().sync_updates(), 0);
      assert_eq!(ws.view(other).unwrap().sync_updates(), 1);
      assert_eq!(ws.view(owner).unwrap().sync_updates(), 0);
      assert_eq!(ws.view(origin).unwrap().sync_state(), SyncState::Idle);
    }

    #[test]
    fn inline_edit_without_owner_promotes() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("x", "plain");
      let inline = ws.attach_view(doc, ViewOptions::inline(0, 0)).unwrap();
      let changes = insert(&ws, inline, 1, "y");
      ws.edit_view(inline, changes).unwrap();
      assert!(ws.view(inline).unwrap().is_owner());
      assert_eq!(text(&ws, inline), "xy");
      assert_eq!(ws.view(inline).unwrap().sync_updates(), 0);
    }

    #[test]
    fn lost_content_is_terminal() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("a\nb\nc\nd", "plain");
      let owner = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let inline = ws.attach_view(doc, ViewOptions::inline(1, 2)).unwrap();

      // Joins line 0 with line 1, across the start of the range.
      let rope = ws.view(owner).unwrap().text();
      let changes = ChangeSet::change(&rope, [(1, 2, None)]).unwrap();
      ws.edit_view(owner, changes).unwrap();
      assert_eq!(ws.drain_events(), vec![WorkspaceEvent::LostContent {
        view: inline,
      }]);
      assert!(ws.view(inline).unwrap().is_lost());

      let changes = insert(&ws, owner, 0, "z");
      ws.edit_view(owner, changes).unwrap();
      assert!(ws.drain_events().is_empty());

      let changes = insert(&ws, owner, 0, "z");
      assert_eq!(
        ws.edit_view(inline, changes),
        Err(WorkspaceError::ContentLost(inline))
      );
      assert_eq!(
        ws.execute(Command::ToggleLineComment, Some(inline)),
        Err(WorkspaceError::ContentLost(inline))
      );
    }

    #[test]
    fn hidden_lines_follow_the_range() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("a\nb\nc", "plain");
      let owner = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let inline = ws.attach_view(doc, ViewOptions::inline(1, 1)).unwrap();
      assert_eq!(ws.view(inline).unwrap().hidden_lines(), &[(0, 0), (2, 2)]);

      let changes = insert(&ws, owner, 0, "x\n");
      ws.edit_view(owner, changes).unwrap();
      assert_eq!(ws.view(inline).unwrap().hidden_lines(), &[(0, 1), (3, 3)]);
    }
  }

  mod lifecycle {
    use super::*;
    use crate::document::DocumentHandle;

    #[derive(Debug)]
    struct Peek {
      handle: Option<DocumentHandle>,
    }

    impl InlineWidget for Peek {
      fn height(&self) -> usize {
        1
      }

      fn on_closed(&mut self) {
        self.handle = None;
      }
    }

    #[test]
    fn owner_hand_off_then_detach() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("text", "plain");
      let first = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let second = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let inline = ws.attach_view(doc, ViewOptions::inline(0, 0)).unwrap();

      ws.dispose_view(first).unwrap();
      assert_eq!(ws.document(doc).unwrap().owner(), Some(second));
      assert!(ws.view(second).unwrap().is_owner());

      ws.dispose_view(second).unwrap();
      assert!(ws.document(doc).unwrap().is_detached());
      let changes = insert(&ws, inline, 0, "x");
      assert_eq!(
        ws.edit_view(inline, changes),
        Err(WorkspaceError::Document(DocumentError::Detached))
      );
      assert_eq!(text(&ws, inline), "text");
      assert_eq!(ws.drain_events(), vec![
        WorkspaceEvent::ViewClosed { view: first },
        WorkspaceEvent::ViewClosed { view: second },
      ]);
    }

    #[test]
    fn disposal_releases_every_reference() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("a\nb\nc", "plain");
      let other = ws.open_document("peek", "plain");
      let view = ws.attach_view(doc, ViewOptions::inline(0, 1)).unwrap();

      let handle = DocumentHandle::acquire(ws.shared_document(other).unwrap());
      ws.add_widget(view, 0, Box::new(Peek {
        handle: Some(handle),
      }))
      .unwrap();
      assert_eq!(ws.document(doc).unwrap().ref_count(), 2);
      assert_eq!(ws.document(other).unwrap().ref_count(), 1);

      ws.dispose_view(view).unwrap();
      assert_eq!(ws.document(doc).unwrap().ref_count(), 0);
      assert_eq!(ws.document(other).unwrap().ref_count(), 0);
      assert!(ws.document(doc).unwrap().listeners().is_empty());
      assert_eq!(ws.focused_view(), None);
      assert_eq!(ws.dispose_view(view), Err(WorkspaceError::UnknownView(view)));
    }

    #[test]
    fn config_reaches_live_views() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("", "plain");
      let view = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let config = EditorConfig {
        tab_size: 2,
        ..EditorConfig::default()
      };
      ws.set_config(config);
      assert_eq!(ws.view(view).unwrap().config().tab_size, 2);
    }

    #[test]
    fn widgets_below_an_insert_move() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("a\nb\nc", "plain");
      let view = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let above = ws
        .add_widget(view, 0, Box::new(Peek { handle: None }))
        .unwrap();
      let below = ws
        .add_widget(view, 2, Box::new(Peek { handle: None }))
        .unwrap();
      ws.drain_events();

      let changes = insert(&ws, view, 2, "x\n");
      ws.edit_view(view, changes).unwrap();
      assert_eq!(ws.drain_events(), vec![WorkspaceEvent::OffsetTopChanged {
        view,
        widget: below,
      }]);

      ws.set_widget_height(view, above, 5).unwrap();
      assert_eq!(ws.drain_events(), vec![WorkspaceEvent::OffsetTopChanged {
        view,
        widget: below,
      }]);
      assert!(ws.remove_widget(view, below).unwrap());
      assert!(!ws.remove_widget(view, below).unwrap());
    }

    #[derive(Debug)]
    struct Exploding;

    impl InlineWidget for Exploding {
      fn height(&self) -> usize {
        1
      }

      fn on_closed(&mut self) {
        panic!("close failed");
      }
    }

    #[test]
    fn a_panicking_widget_does_not_block_the_hand_off() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("a\nb", "plain");
      let other = ws.open_document("peek", "plain");
      let first = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let second = ws.attach_view(doc, ViewOptions::full()).unwrap();
      ws.add_widget(first, 0, Box::new(Exploding)).unwrap();
      let handle = DocumentHandle::acquire(ws.shared_document(other).unwrap());
      ws.add_widget(first, 1, Box::new(Peek {
        handle: Some(handle),
      }))
      .unwrap();

      let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        ws.dispose_view(first)
      }));
      assert!(result.is_err());
      assert!(ws.view(first).is_none());
      assert_eq!(ws.document(other).unwrap().ref_count(), 0);
      assert_eq!(ws.document(doc).unwrap().owner(), Some(second));
      assert!(ws.view(second).unwrap().is_owner());

      let changes = insert(&ws, second, 0, "x");
      ws.edit_view(second, changes).unwrap();
      assert_eq!(text(&ws, second), "xa\nb");

      ws.dispose_view(second).unwrap();
      assert!(ws.document(doc).unwrap().is_detached());
      assert_eq!(ws.document(doc).unwrap().ref_count(), 0);
    }
  }

  mod commands {
    use super::*;
    use crate::navigation::NavigationIntent;

    #[test]
    fn nothing_focused_is_a_noop() {
      let mut ws = Workspace::default();
      assert_eq!(
        ws.execute(Command::ToggleLineComment, None),
        Ok(CommandOutcome::Noop)
      );
      let doc = ws.open_document("a", "plain");
      let view = ws.attach_view(doc, ViewOptions::full()).unwrap();
      ws.set_selections(view, Vec::new()).unwrap();
      assert_eq!(
        ws.execute(Command::DuplicateSelection, None),
        Ok(CommandOutcome::Noop)
      );
    }

    #[test]
    fn commands_reach_mirrors() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("a\nb\nc", "plain");
      let owner = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let mirror = ws.attach_view(doc, ViewOptions::full()).unwrap();
      ws.set_selections(mirror, [cursor(1, 0)]).unwrap();

      let outcome = ws
        .execute(Command::MoveLine(Direction::Up), Some(mirror))
        .unwrap();
      assert_eq!(outcome, CommandOutcome::Edited { version: 1 });
      assert_eq!(text(&ws, owner), "b\na\nc");
      assert_eq!(text(&ws, mirror), "b\na\nc");
      let sel = ws.view(mirror).unwrap().selections().as_slice()[0];
      assert_eq!(sel.start, Position::new(0, 0));
    }

    #[test]
    fn closing_bracket_reindents_later() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("if x {\n  y\n      ", "javascript");
      let view = ws.attach_view(doc, ViewOptions::full()).unwrap();
      ws.set_selections(view, [cursor(2, 6)]).unwrap();

      ws.type_text(None, "}").unwrap();
      assert_eq!(text(&ws, view), "if x {\n  y\n      }");
      assert_eq!(ws.run_deferred().unwrap(), 1);
      assert_eq!(text(&ws, view), "if x {\n  y\n}");
      let sel = ws.view(view).unwrap().selections().as_slice()[0];
      assert_eq!(sel.start, Position::new(2, 1));
      assert_eq!(ws.run_deferred().unwrap(), 0);
    }

    #[test]
    fn scheduled_reindent_follows_later_edits() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("fn a() {\n    x\n    ", "javascript");
      let owner = ws.attach_view(doc, ViewOptions::full()).unwrap();
      let mirror = ws.attach_view(doc, ViewOptions::full()).unwrap();
      ws.set_selections(owner, [cursor(2, 4)]).unwrap();

      ws.type_text(Some(owner), "}").unwrap();
      let changes = insert(&ws, mirror, 0, "    y\n");
      ws.edit_view(mirror, changes).unwrap();
      assert_eq!(text(&ws, owner), "    y\nfn a() {\n    x\n    }");

      assert_eq!(ws.run_deferred().unwrap(), 1);
      assert_eq!(text(&ws, owner), "    y\nfn a() {\n    x\n}");
      assert_eq!(text(&ws, mirror), text(&ws, owner));
    }

    #[test]
    fn soft_tab_backspace() {
      let mut ws = Workspace::default();
      let doc = ws.open_document("        x", "plain");
      let view = ws.attach_view(doc, ViewOptions::full()).unwrap();
      ws.set_selections(view, [cursor(0, 8)]).unwrap();

      let intent = Command::Navigate(NavigationIntent::DeleteBackward);
      ws.execute(intent, None).unwrap();
      assert_eq!(text(&ws, view), "    x");
      let sel = ws.view(view).unwrap().selections().as_slice()[0];
      assert_eq!(sel.start, Position::new(0, 4));

      let outcome = ws
        .execute(Command::Navigate(NavigationIntent::MoveLeft), None)
        .unwrap();
      assert_eq!(outcome, CommandOutcome::SelectionsChanged);
      let sel = ws.view(view).unwrap().selections().as_slice()[0];
      assert_eq!(sel.start, Position::new(0, 0));
    }
  }
}
