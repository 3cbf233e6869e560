//! Upstream link-graph client.
//!
//! The engine never talks HTTP directly; it depends on the [`LinkSource`]
//! capability. [`WikipediaClient`] is the production implementation,
//! [`ResilientSource`] adds bounded retry with exponential backoff on top of
//! any source.

mod resilient;
mod wikipedia;

pub use resilient::{ResilientSource, RetryConfig};
pub use wikipedia::{ClientConfig, WikipediaClient};

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use wikigraph_core::Title;

#[derive(Error, Debug)]
pub enum UpstreamError {
  #[error("network: {0}")]
  Network(String),
  #[error("upstream returned status {0}")]
  Status(u16),
  #[error("no such article: {0}")]
  TitleUnknown(String),
  #[error("request timed out")]
  Timeout,
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

impl From<reqwest::Error> for UpstreamError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      UpstreamError::Timeout
    } else {
      UpstreamError::Network(err.to_string())
    }
  }
}

/// Whether an error class is worth retrying: transport failures, timeouts,
/// and server-side (5xx) statuses. Unknown titles never are.
pub fn is_retryable(error: &UpstreamError) -> bool {
  match error {
    UpstreamError::Network(_) | UpstreamError::Timeout => true,
    UpstreamError::Status(code) => (500..600).contains(code),
    UpstreamError::TitleUnknown(_) => false,
  }
}

/// Monotonic counters kept by a source and its decorators.
#[derive(Debug, Default)]
pub struct UpstreamCounters {
  pub requests: AtomicU64,
  pub retries: AtomicU64,
  pub failures: AtomicU64,
}

/// Point-in-time snapshot of [`UpstreamCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
  pub requests: u64,
  pub retries: u64,
  pub failures: u64,
}

impl UpstreamCounters {
  pub fn snapshot(&self) -> CounterSnapshot {
    CounterSnapshot {
      requests: self.requests.load(Ordering::Relaxed),
      retries: self.retries.load(Ordering::Relaxed),
      failures: self.failures.load(Ordering::Relaxed),
    }
  }
}

/// Capability for querying the hyperlink graph of the upstream encyclopedia.
///
/// Implementations return normalized titles only; anything that fails
/// normalization is dropped at this boundary so nothing untyped flows inward.
#[async_trait]
pub trait LinkSource: Send + Sync {
  /// Titles the given article links to.
  async fn forward_links(&self, title: &Title) -> Result<HashSet<Title>>;

  /// Titles that link to the given article.
  async fn backward_links(&self, title: &Title) -> Result<HashSet<Title>>;

  /// Resolve a free-form search term to a canonical article title.
  async fn resolve(&self, term: &str) -> Result<Title>;

  /// Request/retry/failure counters accumulated so far.
  fn counters(&self) -> CounterSnapshot;
}
