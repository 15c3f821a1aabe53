//! Shared buffers, synchronized views and selection-aware edit commands.
//!
//! A [`workspace::Workspace`] owns every [`document::Document`] and every
//! [`view::View`] bound to one. Commands compute an [`batch::EditBatch`]
//! against a single snapshot of the buffer, the batch is applied as one
//! mutation and the workspace broadcasts the result to the other views.

use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod batch;
pub mod command;
pub mod comment;
pub mod config;
pub mod document;
pub mod indent;
pub mod language;
pub mod line_selection;
pub mod lines;
pub mod navigation;
pub mod position;
pub mod selection;
pub mod token;
pub mod transaction;
pub mod view;
pub mod visible_range;
pub mod widget;
pub mod workspace;

pub type Tendril = SmartString<LazyCompact>;
