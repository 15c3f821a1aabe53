//! The shared text buffer.
//!
//! A [`Document`] holds the authoritative text for every view bound to it.
//! It is only mutated through [`Document::apply_edit_batch`] or
//! [`Document::apply_changes`]; both produce a [`DocumentChange`] that the
//! workspace broadcasts to the attached views.
//!
//! Views keep the buffer alive through a [`DocumentHandle`], which adds a
//! reference when acquired and releases it when dropped.
//!
//! # Ownership
//!
//! At most one view owns the buffer. The first view to edit a buffer without
//! an owner becomes its owner. When the owner goes away the most recently
//! associated full view takes over, and when there is none the buffer is
//! detached: its text stays readable but every edit is refused.

use std::{
  borrow::Cow,
  cell::{
    Ref,
    RefCell,
    RefMut,
  },
  num::NonZeroUsize,
  rc::Rc,
};

use ropey::{
  Rope,
  RopeSlice,
};
use tandem_core::line_ending::{
  LineEnding,
  auto_detect_line_ending,
  line_without_line_ending,
  normalize_line_endings,
  with_line_ending,
};
use thiserror::Error;

use crate::{
  batch::{
    BatchError,
    BatchOutcome,
    EditBatch,
    resolve_batch,
  },
  position::{
    Position,
    line_count,
    line_len,
    position_at_char_idx,
    range_text,
  },
  transaction::{
    ChangeSet,
    TransactionError,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(NonZeroUsize);

impl DocumentId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

impl From<NonZeroUsize> for DocumentId {
  fn from(value: NonZeroUsize) -> Self {
    Self::new(value)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(NonZeroUsize);

impl ViewId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

impl From<NonZeroUsize> for ViewId {
  fn from(value: NonZeroUsize) -> Self {
    Self::new(value)
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DocumentError {
  #[error("document is detached from its owner and read-only")]
  Detached,
  #[error("reference count released below zero")]
  RefCountUnderflow,
  #[error(transparent)]
  Batch(#[from] BatchError),
  #[error(transparent)]
  Transaction(#[from] TransactionError),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// One replacement in line terms, in the coordinates that hold when the
/// records of a change are replayed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
  pub from: Position,
  pub to:   Position,
  /// Inserted text split on `\n`; a pure deletion is `[""]`.
  pub text: Vec<String>,
}

impl ChangeRecord {
  /// Lines added by this record (negative when lines were removed).
  pub fn lines_added(&self) -> isize {
    self.text.len() as isize - (self.to.line - self.from.line + 1) as isize
  }
}

/// A buffer mutation as seen by the views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
  pub document: DocumentId,
  pub changes:  ChangeSet,
  /// Last change in the document first.
  pub records:  Vec<ChangeRecord>,
  pub origin:   Option<ViewId>,
  pub version:  usize,
}

#[derive(Debug)]
pub struct Document {
  id:          DocumentId,
  text:        Rope,
  language:    String,
  line_ending: LineEnding,
  version:     usize,
  ref_count:   usize,
  owner:       Option<ViewId>,
  full_views:  Vec<ViewId>,
  listeners:   Vec<ViewId>,
  detached:    bool,
}

impl Document {
  pub fn new(id: DocumentId, text: &str, language: impl Into<String>) -> Self {
    let line_ending = auto_detect_line_ending(text).unwrap_or_default();
    Self {
      id,
      text: Rope::from(normalize_line_endings(text).as_ref()),
      language: language.into(),
      line_ending,
      version: 0,
      ref_count: 0,
      owner: None,
      full_views: Vec::new(),
      listeners: Vec::new(),
      detached: false,
    }
  }

  pub fn id(&self) -> DocumentId {
    self.id
  }

  pub fn text(&self) -> &Rope {
    &self.text
  }

  pub fn slice(&self) -> RopeSlice<'_> {
    self.text.slice(..)
  }

  /// Text with the line ending the buffer was loaded with.
  pub fn text_with_line_endings(&self) -> String {
    with_line_ending(&self.text, self.line_ending)
  }

  pub fn line_ending(&self) -> LineEnding {
    self.line_ending
  }

  pub fn language(&self) -> &str {
    &self.language
  }

  pub fn set_language(&mut self, language: impl Into<String>) {
    self.language = language.into();
  }

  /// Line `n` without its terminator.
  pub fn line(&self, n: usize) -> Option<Cow<'_, str>> {
    if n >= self.line_count() {
      return None;
    }
    let slice = self.text.slice(..);
    Some(line_without_line_ending(&slice, n).into())
  }

  pub fn line_count(&self) -> usize {
    line_count(self.text.slice(..))
  }

  pub fn line_len(&self, n: usize) -> usize {
    line_len(self.text.slice(..), n)
  }

  /// Text between two positions, clamped to the buffer.
  pub fn range(&self, start: Position, end: Position) -> String {
    range_text(self.text.slice(..), start, end)
  }

  /// Position of the end of the buffer.
  pub fn end_position(&self) -> Position {
    position_at_char_idx(self.text.slice(..), self.text.len_chars())
  }

  /// Number of mutations applied so far.
  pub fn version(&self) -> usize {
    self.version
  }

  pub fn ref_count(&self) -> usize {
    self.ref_count
  }

  pub fn add_ref(&mut self) {
    self.ref_count += 1;
  }

  pub fn release_ref(&mut self) -> Result<usize> {
    self.ref_count = self
      .ref_count
      .checked_sub(1)
      .ok_or(DocumentError::RefCountUnderflow)?;
    Ok(self.ref_count)
  }

  pub fn owner(&self) -> Option<ViewId> {
    self.owner
  }

  pub fn is_detached(&self) -> bool {
    self.detached
  }

  /// Makes `view` the owner unless there already is one.
  pub fn ensure_owner(&mut self, view: ViewId) -> Result<ViewId> {
    if self.detached {
      return Err(DocumentError::Detached);
    }
    match self.owner {
      Some(owner) => Ok(owner),
      None => {
        tracing::debug!(document = ?self.id, ?view, "promoting view to owner");
        self.owner = Some(view);
        Ok(view)
      },
    }
  }

  /// Records a full (non-inline) view as a candidate owner.
  pub fn associate_full_view(&mut self, view: ViewId) {
    if !self.full_views.contains(&view) {
      self.full_views.push(view);
    }
  }

  /// Forgets `view`. When it owned the buffer, ownership passes to the most
  /// recently associated full view, or the buffer detaches. Returns the new
  /// owner.
  pub fn disconnect_view(&mut self, view: ViewId) -> Option<ViewId> {
    self.full_views.retain(|&id| id != view);
    if self.owner != Some(view) {
      return self.owner;
    }

    self.owner = self.full_views.last().copied();
    match self.owner {
      Some(owner) => {
        tracing::debug!(document = ?self.id, ?owner, "ownership handed over");
      },
      None => {
        tracing::debug!(document = ?self.id, "owner gone, detaching");
        self.detached = true;
      },
    }
    self.owner
  }

  pub fn listeners(&self) -> &[ViewId] {
    &self.listeners
  }

  pub fn attach_listener(&mut self, view: ViewId) {
    if !self.listeners.contains(&view) {
      self.listeners.push(view);
    }
  }

  pub fn detach_listener(&mut self, view: ViewId) {
    self.listeners.retain(|&id| id != view);
  }

  /// Applies a whole batch as one mutation.
  pub fn apply_edit_batch(
    &mut self,
    batch: &EditBatch,
    origin: Option<ViewId>,
  ) -> Result<(BatchOutcome, DocumentChange)> {
    if self.detached {
      tracing::warn!(document = ?self.id, "edit batch refused, document is detached");
      return Err(DocumentError::Detached);
    }
    let outcome = resolve_batch(&self.text, batch)?;
    let change = self.apply_changes(outcome.changes.clone(), origin)?;
    Ok((outcome, change))
  }

  /// Applies `changes` as one mutation.
  pub fn apply_changes(
    &mut self,
    changes: ChangeSet,
    origin: Option<ViewId>,
  ) -> Result<DocumentChange> {
    if self.detached {
      tracing::warn!(document = ?self.id, "change refused, document is detached");
      return Err(DocumentError::Detached);
    }
    let records = change_records(self.text.slice(..), &changes);
    changes.apply(&mut self.text)?;
    self.version += 1;
    tracing::debug!(
      document = ?self.id,
      version = self.version,
      records = records.len(),
      "document changed"
    );

    Ok(DocumentChange {
      document: self.id,
      changes,
      records,
      origin,
      version: self.version,
    })
  }
}

/// Line-based records for `changes`, last change first.
pub fn change_records(before: RopeSlice, changes: &ChangeSet) -> Vec<ChangeRecord> {
  let mut records: Vec<ChangeRecord> = changes
    .changes_iter()
    .map(|(from, to, text)| ChangeRecord {
      from: position_at_char_idx(before, from),
      to:   position_at_char_idx(before, to),
      text: text
        .as_deref()
        .unwrap_or("")
        .split('\n')
        .map(str::to_owned)
        .collect(),
    })
    .collect();
  records.reverse();
  records
}

/// A counted reference to a shared [`Document`].
#[derive(Debug)]
pub struct DocumentHandle {
  doc: Rc<RefCell<Document>>,
}

impl DocumentHandle {
  pub fn acquire(doc: &Rc<RefCell<Document>>) -> Self {
    doc.borrow_mut().add_ref();
    Self {
      doc: Rc::clone(doc),
    }
  }

  pub fn id(&self) -> DocumentId {
    self.doc.borrow().id()
  }

  pub fn borrow(&self) -> Ref<'_, Document> {
    self.doc.borrow()
  }

  pub fn borrow_mut(&self) -> RefMut<'_, Document> {
    self.doc.borrow_mut()
  }

  pub fn shared(&self) -> &Rc<RefCell<Document>> {
    &self.doc
  }
}

impl Drop for DocumentHandle {
  fn drop(&mut self) {
    match self.doc.try_borrow_mut() {
      Ok(mut doc) => {
        if let Err(err) = doc.release_ref() {
          tracing::warn!(%err, "releasing document reference");
        }
      },
      Err(_) => tracing::warn!("document borrowed while releasing a reference"),
    }
  }
}
