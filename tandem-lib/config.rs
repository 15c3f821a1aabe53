//! Editor-wide settings.
//!
//! Settings are read from TOML. A workspace-local file is merged over the
//! global one before deserializing, so a local file only has to name the
//! keys it changes.

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
  #[error("failed to parse config: {0}")]
  Parse(#[source] toml::de::Error),
  #[error("invalid config: {0}")]
  Deserialize(#[source] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EditorConfig {
  /// Width of a tab character in columns.
  pub tab_size:            usize,
  /// Columns added per indentation level.
  pub indent_unit:         usize,
  pub use_tab_char:        bool,
  /// Cursor movement and deletion treat indentation made of spaces as tab
  /// stops.
  pub soft_tabs:           bool,
  pub smart_indent:        bool,
  /// Line comments go in front of the first non-whitespace character
  /// instead of at column 0.
  pub indent_line_comment: bool,
}

impl Default for EditorConfig {
  fn default() -> Self {
    Self {
      tab_size:            4,
      indent_unit:         4,
      use_tab_char:        false,
      soft_tabs:           true,
      smart_indent:        true,
      indent_line_comment: false,
    }
  }
}

impl EditorConfig {
  pub fn from_toml(source: &str) -> Result<Self> {
    Self::load(source, None)
  }

  /// Reads `global`, then merges `local` over it.
  pub fn load(global: &str, local: Option<&str>) -> Result<Self> {
    let mut value: toml::Value = toml::from_str(global).map_err(ConfigError::Parse)?;
    if let Some(local) = local {
      let local: toml::Value = toml::from_str(local).map_err(ConfigError::Parse)?;
      value = merge_toml_values(value, local, 3);
    }
    let config = value.try_into().map_err(ConfigError::Deserialize)?;
    tracing::debug!(?config, "loaded editor config");
    Ok(config)
  }

  /// The whitespace inserted for one indentation level.
  pub fn indent_unit_str(&self) -> String {
    if self.use_tab_char {
      "\t".to_string()
    } else {
      " ".repeat(self.indent_unit.max(1))
    }
  }
}

/// Merges `right` into `left`.
///
/// Tables are merged key by key down to `merge_depth` levels. Arrays of
/// tables carrying a `name` key are merged entry by entry, matched on that
/// name; any other array, and every scalar, is replaced by the right value.
pub fn merge_toml_values(left: toml::Value, right: toml::Value, merge_depth: usize) -> toml::Value {
  use toml::Value;

  fn get_name(v: &Value) -> Option<&str> {
    v.get("name").and_then(Value::as_str)
  }

  if merge_depth == 0 {
    return right;
  }

  match (left, right) {
    (Value::Array(mut left_items), Value::Array(right_items)) => {
      if right_items.iter().all(|item| get_name(item).is_none()) {
        return Value::Array(right_items);
      }
      for rvalue in right_items {
        let existing = get_name(&rvalue)
          .and_then(|rname| left_items.iter().position(|v| get_name(v) == Some(rname)));
        match existing {
          Some(lpos) => {
            let lvalue = left_items.remove(lpos);
            left_items.insert(lpos, merge_toml_values(lvalue, rvalue, merge_depth - 1));
          },
          None => left_items.push(rvalue),
        }
      }
      Value::Array(left_items)
    },
    (Value::Table(mut left_map), Value::Table(right_map)) => {
      for (rname, rvalue) in right_map {
        let merged = match left_map.remove(&rname) {
          Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
          None => rvalue,
        };
        left_map.insert(rname, merged);
      }
      Value::Table(left_map)
    },
    (_, value) => value,
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn defaults_when_empty() {
    assert_eq!(EditorConfig::from_toml("").unwrap(), EditorConfig::default());
  }

  #[test]
  fn local_overrides_global() {
    let global = "tab-size = 8\nuse-tab-char = true\n";
    let local = "use-tab-char = false\nindent-line-comment = true\n";
    let config = EditorConfig::load(global, Some(local)).unwrap();
    assert_eq!(config.tab_size, 8);
    assert!(!config.use_tab_char);
    assert!(config.indent_line_comment);
    assert_eq!(config.indent_unit, 4);
  }

  #[test]
  fn rejects_unknown_keys() {
    let err = EditorConfig::from_toml("tab-width = 2").unwrap_err();
    assert!(matches!(err, ConfigError::Deserialize(_)));
  }

  #[test]
  fn rejects_malformed_toml() {
    let err = EditorConfig::load("tab-size = 2", Some("tab-size = ")).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }

  #[test]
  fn indent_unit_string() {
    let mut config = EditorConfig::default();
    assert_eq!(config.indent_unit_str(), "    ");
    config.use_tab_char = true;
    assert_eq!(config.indent_unit_str(), "\t");
  }

  mod merge {
    use super::*;

    fn value(source: &str) -> toml::Value {
      toml::from_str(source).unwrap()
    }

    #[test]
    fn named_entries_merge_in_place() {
      let left = value(
        r###"
        [[language]]
        name = "rust"
        line-comment = ["//"]

        [[language]]
        name = "python"
        line-comment = ["#"]
        "###,
      );
      let right = value(
        r###"
        [[language]]
        name = "rust"
        line-comment = ["//", "///"]

        [[language]]
        name = "nix"
        line-comment = ["#"]
        "###,
      );
      let merged = merge_toml_values(left, right, 3);
      let languages = merged["language"].as_array().unwrap();
      assert_eq!(languages.len(), 3);
      assert_eq!(languages[0]["name"].as_str(), Some("rust"));
      assert_eq!(languages[0]["line-comment"].as_array().unwrap().len(), 2);
      assert_eq!(languages[2]["name"].as_str(), Some("nix"));
    }

    #[test]
    fn plain_arrays_are_replaced() {
      let merged = merge_toml_values(value("a = [1, 2]"), value("a = [3]"), 3);
      assert_eq!(merged["a"].as_array().unwrap().len(), 1);
    }
  }
}
