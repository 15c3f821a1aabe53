//! Comment and string syntax per language.
//!
//! The built-in table is compiled in from `languages.toml`. Callers can merge
//! their own table over it; entries are matched by `name`.

use std::str::from_utf8;

use serde::Deserialize;
use thiserror::Error;

use crate::config::merge_toml_values;

pub const PLAIN_TEXT: &str = "plain";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LanguageError {
  #[error("language table is not valid UTF-8")]
  Utf8(#[from] std::str::Utf8Error),
  #[error("failed to parse language table: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("language `{0}` is defined more than once")]
  Duplicate(String),
}

pub type Result<T> = std::result::Result<T, LanguageError>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BlockCommentToken {
  pub start: String,
  pub end:   String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Language {
  pub name:          String,
  #[serde(default)]
  pub file_types:    Vec<String>,
  #[serde(default)]
  pub line_comment:  Vec<String>,
  #[serde(default)]
  pub block_comment: Option<BlockCommentToken>,
  /// Characters that open and close a single-line string literal.
  #[serde(default)]
  pub string_quotes: Vec<char>,
}

impl Language {
  /// A language without any comment syntax.
  pub fn plain() -> Self {
    Self {
      name:          PLAIN_TEXT.to_string(),
      file_types:    Vec::new(),
      line_comment:  Vec::new(),
      block_comment: None,
      string_quotes: Vec::new(),
    }
  }

  pub fn has_line_comment_syntax(&self) -> bool {
    !self.line_comment.is_empty()
  }

  pub fn line_comment_prefixes(&self) -> &[String] {
    &self.line_comment
  }

  pub fn has_block_comment_syntax(&self) -> bool {
    self.block_comment.is_some()
  }

  pub fn block_comment_prefix(&self) -> Option<&str> {
    self.block_comment.as_ref().map(|token| token.start.as_str())
  }

  pub fn block_comment_suffix(&self) -> Option<&str> {
    self.block_comment.as_ref().map(|token| token.end.as_str())
  }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LanguageTable {
  #[serde(default)]
  language: Vec<Language>,
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
  languages: Vec<Language>,
  plain:     Language,
}

impl LanguageRegistry {
  /// The compiled-in table.
  pub fn builtin() -> Self {
    Self::from_value(default_lang_config().expect("built-in languages.toml is valid"))
      .expect("built-in languages.toml is well formed")
  }

  /// The compiled-in table with `overrides` merged over it.
  pub fn with_overrides(overrides: &str) -> Result<Self> {
    let user: toml::Value = toml::from_str(overrides)?;
    Self::from_value(merge_toml_values(default_lang_config()?, user, 3))
  }

  pub fn from_toml(source: &str) -> Result<Self> {
    Self::from_value(toml::from_str(source)?)
  }

  fn from_value(value: toml::Value) -> Result<Self> {
    let table: LanguageTable = value.try_into()?;
    for (idx, language) in table.language.iter().enumerate() {
      if table.language[..idx]
        .iter()
        .any(|other| other.name == language.name)
      {
        return Err(LanguageError::Duplicate(language.name.clone()));
      }
    }
    let mut languages = table.language;
    for language in &mut languages {
      language.line_comment.retain(|prefix| !prefix.is_empty());
      if language
        .block_comment
        .as_ref()
        .is_some_and(|token| token.start.is_empty() || token.end.is_empty())
      {
        language.block_comment = None;
      }
    }
    Ok(Self {
      languages,
      plain: Language::plain(),
    })
  }

  pub fn get(&self, name: &str) -> Option<&Language> {
    self.languages.iter().find(|language| language.name == name)
  }

  pub fn for_extension(&self, extension: &str) -> Option<&Language> {
    let extension = extension.trim_start_matches('.');
    self.languages.iter().find(|language| {
      language
        .file_types
        .iter()
        .any(|ty| ty.eq_ignore_ascii_case(extension))
    })
  }

  /// The language called `name`, or plain text.
  pub fn get_or_plain(&self, name: &str) -> &Language {
    self.get(name).unwrap_or_else(|| {
      tracing::trace!(language = name, "unknown language, using plain text");
      &self.plain
    })
  }

  pub fn iter(&self) -> impl Iterator<Item = &Language> {
    self.languages.iter()
  }
}

impl Default for LanguageRegistry {
  fn default() -> Self {
    Self::builtin()
  }
}

/// The built-in `languages.toml`.
pub fn default_lang_config() -> Result<toml::Value> {
  let source = from_utf8(include_bytes!("languages.toml"))?;
  Ok(toml::from_str(source)?)
}
