//! Text primitives shared by the tandem crates: line endings, character
//! classes and small rope helpers. Nothing in here knows about views,
//! selections or edits.

pub mod chars;
pub mod line_ending;
pub mod rope;
