//! Search request parsing and validation.

use crate::title::{Title, TitleError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PATHS: usize = 5;
pub const MAX_TERM_LEN: usize = 255;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
  #[error("{field} is required")]
  Missing { field: &'static str },
  #[error("{field} must be at most {max} characters")]
  TooLong { field: &'static str, max: usize },
  #[error("{field} must be between {min} and {max}")]
  OutOfRange { field: &'static str, min: f64, max: f64 },
  #[error("{field}: {source}")]
  Title {
    field: &'static str,
    source: TitleError,
  },
}

/// A path search request as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
  pub start: String,
  pub end: String,
  #[serde(default = "default_max_paths")]
  pub max_paths: usize,
  #[serde(default = "default_min_diversity")]
  pub min_diversity: f64,
}

fn default_max_paths() -> usize {
  1
}

fn default_min_diversity() -> f64 {
  0.3
}

/// A request whose fields have passed validation and normalization.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
  /// The raw search terms as submitted, for logging and persistence.
  pub start_term: String,
  pub end_term: String,
  /// Normalized forms used until upstream resolution replaces them with
  /// canonical titles.
  pub start: Title,
  pub end: Title,
  pub max_paths: usize,
  pub min_diversity: f64,
}

impl SearchRequest {
  pub fn validate(&self) -> Result<ValidatedRequest, RequestError> {
    let start_term = validate_term("start", &self.start)?;
    let end_term = validate_term("end", &self.end)?;

    if self.max_paths < 1 || self.max_paths > MAX_PATHS {
      return Err(RequestError::OutOfRange {
        field: "max_paths",
        min: 1.0,
        max: MAX_PATHS as f64,
      });
    }
    if !(0.0..=1.0).contains(&self.min_diversity) {
      return Err(RequestError::OutOfRange {
        field: "min_diversity",
        min: 0.0,
        max: 1.0,
      });
    }

    let start = Title::normalize(&start_term).map_err(|source| RequestError::Title { field: "start", source })?;
    let end = Title::normalize(&end_term).map_err(|source| RequestError::Title { field: "end", source })?;

    Ok(ValidatedRequest {
      start_term,
      end_term,
      start,
      end,
      max_paths: self.max_paths,
      min_diversity: self.min_diversity,
    })
  }
}

fn validate_term(field: &'static str, raw: &str) -> Result<String, RequestError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(RequestError::Missing { field });
  }
  if trimmed.len() > MAX_TERM_LEN {
    return Err(RequestError::TooLong { field, max: MAX_TERM_LEN });
  }
  Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(start: &str, end: &str) -> SearchRequest {
    SearchRequest {
      start: start.to_string(),
      end: end.to_string(),
      max_paths: 1,
      min_diversity: 0.3,
    }
  }

  #[test]
  fn accepts_a_plain_request() {
    let validated = request("Rust (programming language)", "Tokyo").validate().unwrap();
    assert_eq!(validated.start.as_str(), "Rust (programming language)");
    assert_eq!(validated.max_paths, 1);
  }

  #[test]
  fn rejects_empty_terms_before_any_work() {
    assert_eq!(
      request("", "Tokyo").validate().unwrap_err(),
      RequestError::Missing { field: "start" }
    );
    assert_eq!(
      request("Tokyo", "   ").validate().unwrap_err(),
      RequestError::Missing { field: "end" }
    );
  }

  #[test]
  fn rejects_overlong_terms() {
    let long = "x".repeat(MAX_TERM_LEN + 1);
    assert!(matches!(
      request(&long, "Tokyo").validate(),
      Err(RequestError::TooLong { field: "start", .. })
    ));
  }

  #[test]
  fn bounds_max_paths_and_diversity() {
    let mut req = request("A", "B");
    req.max_paths = 0;
    assert!(matches!(
      req.validate(),
      Err(RequestError::OutOfRange { field: "max_paths", .. })
    ));

    let mut req = request("A", "B");
    req.max_paths = 6;
    assert!(req.validate().is_err());

    let mut req = request("A", "B");
    req.min_diversity = 1.5;
    assert!(matches!(
      req.validate(),
      Err(RequestError::OutOfRange { field: "min_diversity", .. })
    ));
  }

  #[test]
  fn defaults_apply_on_deserialization() {
    let req: SearchRequest = serde_json::from_str(r#"{"start": "A", "end": "B"}"#).unwrap();
    assert_eq!(req.max_paths, 1);
    assert!((req.min_diversity - 0.3).abs() < 1e-9);
  }
}
