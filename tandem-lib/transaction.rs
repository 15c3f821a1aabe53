//! Change sets: the operational-transform core under every buffer mutation.
//!
//! A [`ChangeSet`] walks a document from the start and either keeps
//! (`Retain`), removes (`Delete`) or adds (`Insert`) text. It knows the
//! length it expects (`len`) and the length it produces (`len_after`), so a
//! change set built against one snapshot refuses to apply to another.
//!
//! ```ignore
//! let doc = Rope::from("hello world");
//! let changes = ChangeSet::change(&doc, [(6, 11, Some("rust".into()))])?;
//! assert_eq!(changes.apply_to(&doc)?, "hello rust");
//! ```
//!
//! Positions are carried across a change set with [`ChangeSet::map_pos`].
//! [`Assoc`] decides what happens to a position sitting exactly where text is
//! inserted: `Before` stays in front of the new text, `After` moves past it.

use std::{
  cmp::Ordering,
  iter::once,
};

use ropey::{
  Rope,
  RopeBuilder,
  RopeSlice,
};
use thiserror::Error;

use crate::Tendril;

pub type Result<T> = std::result::Result<T, TransactionError>;

/// `(from, to, replacement)` in char indices of the document the change set
/// is built against.
pub type Change = (usize, usize, Option<Tendril>);

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransactionError {
  #[error("changeset length mismatch: expected {expected}, got {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error(
    "changeset compose length mismatch: left output {left_len_after}, right input {right_len}"
  )]
  ComposeLengthMismatch {
    left_len_after: usize,
    right_len:      usize,
  },
  #[error("invalid change range: start {from} is after end {to}")]
  InvalidRange { from: usize, to: usize },
  #[error("change range {from}..{to} is out of bounds for document length {len}")]
  RangeOutOfBounds {
    from: usize,
    to:   usize,
    len:  usize,
  },
  #[error("change range {from}..{to} overlaps previous end {prev_end}")]
  OverlappingRange {
    prev_end: usize,
    from:     usize,
    to:       usize,
  },
  #[error("positions {positions:?} are out of bounds for changeset length {len}")]
  PositionsOutOfBounds {
    positions: Vec<usize>,
    len:       usize,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  /// Keep n characters.
  Retain(usize),

  /// Drop n characters.
  Delete(usize),

  /// Insert text at the current position.
  Insert(Tendril),
}

impl Operation {
  pub fn len_chars(&self) -> usize {
    match self {
      Operation::Retain(n) | Operation::Delete(n) => *n,
      Operation::Insert(s) => s.chars().count(),
    }
  }
}

/// Which side of an insertion a position sticks to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Assoc {
  /// Stay in front of text inserted at the position.
  Before,
  /// Move past text inserted at the position.
  #[default]
  After,
}

impl Assoc {
  fn insert_offset(self, s: &str) -> usize {
    match self {
      Assoc::Before => 0,
      Assoc::After => s.chars().count(),
    }
  }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
  pub(crate) changes: Vec<Operation>,
  /// Document length this change set applies to.
  len:                usize,
  len_after:          usize,
}

impl ChangeSet {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      changes:   Vec::with_capacity(capacity),
      len:       0,
      len_after: 0,
    }
  }

  /// An identity change set for `doc`.
  #[must_use]
  pub fn new(doc: RopeSlice) -> Self {
    let len = doc.len_chars();
    Self {
      changes: Vec::new(),
      len,
      len_after: len,
    }
  }

  /// Builds a change set from sorted, non-overlapping changes.
  pub fn change<I>(doc: &Rope, changes: I) -> Result<Self>
  where
    I: IntoIterator<Item = Change>,
  {
    Self::change_len(doc.len_chars(), changes)
  }

  /// Like [`ChangeSet::change`] for a document of `len` chars that is not at
  /// hand.
  pub fn change_len<I>(len: usize, changes: I) -> Result<Self>
  where
    I: IntoIterator<Item = Change>,
  {
    let changes = changes.into_iter();
    let (lower, upper) = changes.size_hint();
    let mut changeset = ChangeSet::with_capacity(2 * upper.unwrap_or(lower) + 1);

    let mut last = 0;
    for (from, to, tendril) in changes {
      if from > to {
        return Err(TransactionError::InvalidRange { from, to });
      }
      if to > len {
        return Err(TransactionError::RangeOutOfBounds { from, to, len });
      }
      if from < last {
        return Err(TransactionError::OverlappingRange {
          prev_end: last,
          from,
          to,
        });
      }

      changeset.retain(from - last);
      if let Some(text) = tendril {
        changeset.insert(text);
      }
      changeset.delete(to - from);
      last = to;
    }
    changeset.retain(len - last);

    Ok(changeset)
  }

  pub fn operations(&self) -> &[Operation] {
    &self.changes
  }

  /// Document length this change set expects.
  pub fn len(&self) -> usize {
    self.len
  }

  /// Document length after applying.
  pub fn len_after(&self) -> usize {
    self.len_after
  }

  pub fn delete(&mut self, n: usize) {
    use Operation::*;

    if n == 0 {
      return;
    }
    self.len += n;

    match self.changes.last_mut() {
      Some(Delete(count)) => *count += n,
      _ => self.changes.push(Delete(n)),
    }
  }

  pub fn insert(&mut self, fragment: Tendril) {
    use Operation::*;

    if fragment.is_empty() {
      return;
    }
    self.len_after += fragment.chars().count();

    // Inserts always precede the delete they share a position with.
    let new_last = match self.changes.as_mut_slice() {
      [.., Insert(prev)] | [.., Insert(prev), Delete(_)] => {
        prev.push_str(&fragment);
        return;
      },
      [.., last @ Delete(_)] => std::mem::replace(last, Insert(fragment)),
      _ => Insert(fragment),
    };
    self.changes.push(new_last);
  }

  pub fn retain(&mut self, n: usize) {
    use Operation::*;

    if n == 0 {
      return;
    }
    self.len += n;
    self.len_after += n;

    match self.changes.last_mut() {
      Some(Retain(count)) => *count += n,
      _ => self.changes.push(Retain(n)),
    }
  }

  /// Chains `other` after `self`. The result applied to a document equals
  /// applying `self` and then `other`.
  pub fn compose(self, other: Self) -> Result<Self> {
    use Operation::*;

    if self.len_after != other.len {
      return Err(TransactionError::ComposeLengthMismatch {
        left_len_after: self.len_after,
        right_len:      other.len,
      });
    }
    if self.changes.is_empty() {
      return Ok(Self {
        len: self.len,
        ..other
      });
    }
    if other.changes.is_empty() {
      return Ok(self);
    }

    let mut out = Self::with_capacity(self.changes.len() + other.changes.len());
    let mut left = self.changes.into_iter();
    let mut right = other.changes.into_iter();
    let mut a = left.next();
    let mut b = right.next();

    loop {
      match (a, b) {
        (None, None) => break,
        (Some(Delete(n)), rest) => {
          out.delete(n);
          a = left.next();
          b = rest;
        },
        (rest, Some(Insert(text))) => {
          out.insert(text);
          a = rest;
          b = right.next();
        },
        (Some(Retain(i)), Some(Retain(j))) => {
          let n = i.min(j);
          out.retain(n);
          a = if i > n { Some(Retain(i - n)) } else { left.next() };
          b = if j > n { Some(Retain(j - n)) } else { right.next() };
        },
        (Some(Retain(i)), Some(Delete(j))) => {
          let n = i.min(j);
          out.delete(n);
          a = if i > n { Some(Retain(i - n)) } else { left.next() };
          b = if j > n { Some(Delete(j - n)) } else { right.next() };
        },
        (Some(Insert(mut text)), Some(Delete(j))) => {
          let len = text.chars().count();
          match len.cmp(&j) {
            Ordering::Less => {
              a = left.next();
              b = Some(Delete(j - len));
            },
            Ordering::Equal => {
              a = left.next();
              b = right.next();
            },
            Ordering::Greater => {
              let split = byte_offset(&text, j);
              text.replace_range(..split, "");
              a = Some(Insert(text));
              b = right.next();
            },
          }
        },
        (Some(Insert(mut text)), Some(Retain(j))) => {
          let len = text.chars().count();
          match len.cmp(&j) {
            Ordering::Less => {
              out.insert(text);
              a = left.next();
              b = Some(Retain(j - len));
            },
            Ordering::Equal => {
              out.insert(text);
              a = left.next();
              b = right.next();
            },
            Ordering::Greater => {
              let split = byte_offset(&text, j);
              let rest = text.split_off(split);
              out.insert(text);
              a = Some(Insert(rest));
              b = right.next();
            },
          }
        },
        // Both sides cover the same length, so they run out together.
        (None, Some(_)) | (Some(_), None) => break,
      }
    }

    debug_assert_eq!(out.len, self.len);
    Ok(out)
  }

  fn ensure_len(&self, text_len: usize) -> Result<()> {
    if text_len != self.len {
      return Err(TransactionError::LengthMismatch {
        expected: self.len,
        actual:   text_len,
      });
    }
    Ok(())
  }

  /// Apply in place.
  pub fn apply(&self, text: &mut Rope) -> Result<()> {
    use Operation::*;

    self.ensure_len(text.len_chars())?;
    let mut pos = 0;
    for change in &self.changes {
      match change {
        Retain(n) => pos += n,
        Delete(n) => text.remove(pos..pos + *n),
        Insert(s) => {
          text.insert(pos, s);
          pos += s.chars().count();
        },
      }
    }
    Ok(())
  }

  /// Apply to a copy, leaving `text` untouched.
  pub fn apply_to(&self, text: &Rope) -> Result<Rope> {
    use Operation::*;

    self.ensure_len(text.len_chars())?;
    if self.is_empty() {
      return Ok(text.clone());
    }

    let mut builder = RopeBuilder::new();
    let mut pos = 0;
    let append = |from: usize, to: usize, builder: &mut RopeBuilder| {
      if from < to {
        for chunk in text.slice(from..to).chunks() {
          builder.append(chunk);
        }
      }
    };

    for change in &self.changes {
      match change {
        Retain(n) => {
          append(pos, pos + *n, &mut builder);
          pos += n;
        },
        Delete(n) => pos += n,
        Insert(s) => builder.append(s.as_str()),
      }
    }
    append(pos, self.len, &mut builder);

    Ok(builder.finish())
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.changes.is_empty() || self.changes == [Operation::Retain(self.len)]
  }

  /// Maps positions through the changes in one pass. Sorted input runs in
  /// `O(N + M)`; unsorted input still works but rewinds for every position
  /// that goes backwards.
  pub fn update_positions<'a>(
    &self,
    positions: impl Iterator<Item = (&'a mut usize, Assoc)>,
  ) -> Result<()> {
    use Operation::*;

    let mut positions = positions.peekable();
    let mut old_pos = 0;
    let mut new_pos = 0;
    let mut iter = self.changes.iter().enumerate().peekable();

    'outer: loop {
      macro_rules! map {
        ($map:expr, $i:expr) => {
          loop {
            let Some((pos, assoc)) = positions.peek_mut() else {
              return Ok(());
            };
            if **pos < old_pos {
              // Out of order: walk back to the operation holding `pos`.
              for (i, change) in self.changes[..$i].iter().enumerate().rev() {
                match change {
                  Retain(n) => {
                    old_pos -= n;
                    new_pos -= n;
                  },
                  Delete(n) => old_pos -= n,
                  Insert(ins) => new_pos -= ins.chars().count(),
                }
                if old_pos <= **pos {
                  iter = self.changes[i..].iter().enumerate().peekable();
                }
              }
              debug_assert!(old_pos <= **pos);
              continue 'outer;
            }
            #[allow(clippy::redundant_closure_call)]
            let Some(mapped) = $map(**pos, *assoc) else {
              break;
            };
            **pos = mapped;
            positions.next();
          }
        };
      }

      let Some((i, change)) = iter.next() else {
        map!(
          |pos, _| (old_pos == pos).then_some(new_pos),
          self.changes.len()
        );
        break;
      };

      let mut old_end = old_pos
        + match change {
          Delete(n) | Retain(n) => *n,
          Insert(_) => 0,
        };

      match change {
        Retain(n) => {
          map!(
            |pos, _| (old_end > pos).then_some(new_pos + (pos - old_pos)),
            i
          );
          new_pos += n;
        },
        Delete(_) => {
          map!(|pos, _| (old_end > pos).then_some(new_pos), i);
        },
        Insert(s) => {
          if let Some((_, Delete(len))) = iter.peek() {
            // Replacement: the start of the replaced span behaves like an
            // insertion point, anything inside collapses onto the new text.
            iter.next();
            old_end = old_pos + len;
            map!(
              |pos, assoc: Assoc| {
                (old_end > pos).then(|| new_pos + assoc.insert_offset(s))
              },
              i
            );
          } else {
            map!(
              |pos, assoc: Assoc| (old_pos == pos).then(|| new_pos + assoc.insert_offset(s)),
              i
            );
          }
          new_pos += s.chars().count();
        },
      }
      old_pos = old_end;
    }

    let out_of_bounds: Vec<usize> = positions.map(|(pos, _)| *pos).collect();
    if out_of_bounds.is_empty() {
      Ok(())
    } else {
      Err(TransactionError::PositionsOutOfBounds {
        positions: out_of_bounds,
        len:       self.len,
      })
    }
  }

  /// Maps a single position. See [`Assoc`] for the tie-break.
  pub fn map_pos(&self, mut pos: usize, assoc: Assoc) -> Result<usize> {
    self.update_positions(once((&mut pos, assoc)))?;
    Ok(pos)
  }

  /// Iterates the changes as `(from, to, replacement)` in original
  /// coordinates.
  pub fn changes_iter(&self) -> ChangeIterator<'_> {
    ChangeIterator {
      iter: self.changes.iter().peekable(),
      pos:  0,
    }
  }
}

fn byte_offset(text: &str, chars: usize) -> usize {
  text
    .char_indices()
    .nth(chars)
    .map_or(text.len(), |(idx, _)| idx)
}

pub struct ChangeIterator<'a> {
  iter: std::iter::Peekable<std::slice::Iter<'a, Operation>>,
  pos:  usize,
}

impl Iterator for ChangeIterator<'_> {
  type Item = Change;

  fn next(&mut self) -> Option<Self::Item> {
    use Operation::*;

    loop {
      match self.iter.next()? {
        Retain(len) => self.pos += len,
        Delete(len) => {
          let start = self.pos;
          self.pos += len;
          return Some((start, self.pos, None));
        },
        Insert(s) => {
          let start = self.pos;
          if let Some(Delete(len)) = self.iter.peek() {
            self.iter.next();
            self.pos += len;
          }
          return Some((start, self.pos, Some(s.clone())));
        },
      }
    }
  }
}
