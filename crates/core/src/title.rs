//! Normalized article titles.
//!
//! A `Title` is the node key of the upstream link graph. All titles entering
//! the system (requests, upstream payloads, cached rows) pass through
//! [`Title::normalize`] so that equality and hashing are byte-for-byte on the
//! canonical form.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of a normalized title, in bytes.
pub const MAX_TITLE_BYTES: usize = 255;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TitleError {
  #[error("title is empty")]
  Empty,
  #[error("title is too long ({0} bytes, max {MAX_TITLE_BYTES})")]
  TooLong(usize),
  #[error("title contains control characters")]
  ControlCharacter,
}

/// A normalized article title.
///
/// Normalization: trim, underscores to spaces, whitespace runs collapsed to a
/// single space, first letter uppercased. Titles are case-sensitive after the
/// first character, matching the upstream encyclopedia's conventions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Title(String);

impl Title {
  /// Normalize a raw string into a canonical title.
  pub fn normalize(raw: &str) -> Result<Self, TitleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return Err(TitleError::Empty);
    }
    if trimmed.chars().any(|c| c.is_control() && !c.is_whitespace()) {
      return Err(TitleError::ControlCharacter);
    }

    let mut collapsed = String::with_capacity(trimmed.len());
    let mut pending_space = false;
    for c in trimmed.chars() {
      if c == '_' || c.is_whitespace() {
        pending_space = true;
        continue;
      }
      if pending_space && !collapsed.is_empty() {
        collapsed.push(' ');
      }
      pending_space = false;
      collapsed.push(c);
    }

    if collapsed.len() > MAX_TITLE_BYTES {
      return Err(TitleError::TooLong(collapsed.len()));
    }

    let mut chars = collapsed.chars();
    let normalized = match chars.next() {
      Some(first) if first.is_lowercase() => first.to_uppercase().chain(chars).collect(),
      Some(_) => collapsed,
      None => return Err(TitleError::Empty),
    };

    Ok(Title(normalized))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Title {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<String> for Title {
  type Error = TitleError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Title::normalize(&value)
  }
}

impl From<Title> for String {
  fn from(title: Title) -> Self {
    title.0
  }
}

impl AsRef<str> for Title {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalizes_underscores_and_whitespace() {
    let title = Title::normalize("  albert   einstein ").unwrap();
    assert_eq!(title.as_str(), "Albert einstein");

    let title = Title::normalize("Graph_theory").unwrap();
    assert_eq!(title.as_str(), "Graph theory");

    let title = Title::normalize("a\t b\n c").unwrap();
    assert_eq!(title.as_str(), "A b c");
  }

  #[test]
  fn preserves_case_after_first_letter() {
    let title = Title::normalize("iPhone").unwrap();
    assert_eq!(title.as_str(), "IPhone");

    let title = Title::normalize("NASA").unwrap();
    assert_eq!(title.as_str(), "NASA");
  }

  #[test]
  fn equality_is_on_normalized_form() {
    let a = Title::normalize("graph_theory").unwrap();
    let b = Title::normalize("Graph theory").unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn rejects_empty_and_control_input() {
    assert_eq!(Title::normalize(""), Err(TitleError::Empty));
    assert_eq!(Title::normalize("   "), Err(TitleError::Empty));
    assert_eq!(Title::normalize("___"), Err(TitleError::Empty));
    assert_eq!(Title::normalize("abc\u{0007}def"), Err(TitleError::ControlCharacter));
  }

  #[test]
  fn rejects_overlong_titles() {
    let raw = "a".repeat(MAX_TITLE_BYTES + 1);
    assert!(matches!(Title::normalize(&raw), Err(TitleError::TooLong(_))));
  }

  #[test]
  fn serde_round_trip_renormalizes() {
    let title: Title = serde_json::from_str("\"graph_theory\"").unwrap();
    assert_eq!(title.as_str(), "Graph theory");
    assert_eq!(serde_json::to_string(&title).unwrap(), "\"Graph theory\"");
  }
}
