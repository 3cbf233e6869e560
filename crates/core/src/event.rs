//! Typed search events and their wire framing.
//!
//! Every event a search emits is one of these variants, serialized as
//! `{"type": "...", "data": {...}}` and framed for the stream as
//! `data: <json>\n\n`.

use crate::path::{MergedGraph, Path};
use crate::title::Title;
use serde::{Deserialize, Serialize};

/// Classified failure surfaced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  InvalidInput,
  TitleUnknown,
  UpstreamUnavailable,
  NoPath,
  TimedOut,
  Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartInfo {
  pub start: String,
  pub end: String,
  pub max_paths: usize,
  pub min_diversity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvingInfo {
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTitles {
  pub start: Title,
  pub end: Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressInfo {
  pub forward_depth: usize,
  pub backward_depth: usize,
  pub pages_checked: u64,
  pub pages_per_second: u64,
  pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathFound {
  pub path: Path,
  pub meeting_point: Title,
  /// Number of hops.
  pub length: usize,
  /// Position of this path in the result set, zero-based.
  pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub record_id: Option<i64>,
  pub paths_found: usize,
  pub pages_checked: u64,
  pub elapsed_ms: u64,
  /// True when the search ended early (upstream failure or ceiling) with at
  /// least one path already found.
  pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteInfo {
  pub paths: Vec<Path>,
  pub graph: MergedGraph,
  pub stats: SearchStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
  pub kind: ErrorKind,
  pub message: String,
}

/// One event on a search's stream.
///
/// `Complete` or `Error` is always the final event for a request; nothing
/// follows either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SearchEvent {
  Start(StartInfo),
  Resolving(ResolvingInfo),
  Resolved(ResolvedTitles),
  Progress(ProgressInfo),
  PathFound(PathFound),
  Complete(Box<CompleteInfo>),
  Error(ErrorInfo),
  Keepalive,
}

impl SearchEvent {
  /// Whether this event terminates the stream.
  pub fn is_terminal(&self) -> bool {
    matches!(self, SearchEvent::Complete(_) | SearchEvent::Error(_))
  }

  /// Render the event as a line-delimited stream frame.
  pub fn to_frame(&self) -> serde_json::Result<String> {
    Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn events_carry_a_type_discriminant() {
    let event = SearchEvent::Resolving(ResolvingInfo {
      message: "Resolving article titles...".to_string(),
    });
    let json: serde_json::Value = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "resolving");
    assert_eq!(json["data"]["message"], "Resolving article titles...");
  }

  #[test]
  fn keepalive_has_no_payload() {
    let json = serde_json::to_string(&SearchEvent::Keepalive).unwrap();
    assert_eq!(json, r#"{"type":"keepalive"}"#);
  }

  #[test]
  fn frames_are_line_delimited() {
    let frame = SearchEvent::Keepalive.to_frame().unwrap();
    assert_eq!(frame, "data: {\"type\":\"keepalive\"}\n\n");
  }

  #[test]
  fn error_kind_is_snake_case() {
    let event = SearchEvent::Error(ErrorInfo {
      kind: ErrorKind::TitleUnknown,
      message: "no such article".to_string(),
    });
    let json: serde_json::Value = serde_json::to_value(&event).unwrap();
    assert_eq!(json["data"]["kind"], "title_unknown");
  }

  #[test]
  fn events_round_trip() {
    let event = SearchEvent::Progress(ProgressInfo {
      forward_depth: 2,
      backward_depth: 1,
      pages_checked: 120,
      pages_per_second: 40,
      elapsed_ms: 3000,
    });
    let json = serde_json::to_string(&event).unwrap();
    let back: SearchEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
  }
}
