//! Retry decorator for link sources.
//!
//! Wraps any [`LinkSource`] with bounded retry: exponential backoff with
//! jitter on transport errors, timeouts, and 5xx statuses. Unknown titles
//! pass straight through.

use crate::{is_retryable, CounterSnapshot, LinkSource, Result, UpstreamError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use wikigraph_core::Title;

/// Retry policy: 0.5 s base, doubling, at most 4 attempts, ±20 % jitter.
#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub initial_backoff: Duration,
  pub backoff_factor: f64,
  /// Fractional jitter applied symmetrically around each backoff.
  pub jitter: f64,
  /// Budget for a single attempt; an attempt exceeding it counts as a
  /// retryable timeout.
  pub fetch_timeout: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 4,
      initial_backoff: Duration::from_millis(500),
      backoff_factor: 2.0,
      jitter: 0.2,
      fetch_timeout: Duration::from_secs(10),
    }
  }
}

impl RetryConfig {
  /// Backoff before retry number `attempt` (zero-based), jittered.
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
    let spread = 1.0 + (rand_f64() * 2.0 - 1.0) * self.jitter;
    Duration::from_secs_f64((base * spread).max(0.0))
  }
}

/// A cheap pseudo-random number in [0, 1) for jitter (no external deps).
fn rand_f64() -> f64 {
  use std::time::{SystemTime, UNIX_EPOCH};

  let nanos = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .subsec_nanos();

  (nanos as f64 / u32::MAX as f64).fract()
}

/// A link source that retries transient failures of the wrapped source.
pub struct ResilientSource<S> {
  inner: S,
  config: RetryConfig,
  retries: AtomicU64,
}

impl<S: LinkSource> ResilientSource<S> {
  pub fn new(inner: S) -> Self {
    Self::with_config(inner, RetryConfig::default())
  }

  pub fn with_config(inner: S, config: RetryConfig) -> Self {
    Self {
      inner,
      config,
      retries: AtomicU64::new(0),
    }
  }

  async fn with_retry<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T>
  where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let mut last_error = None;

    for attempt in 0..self.config.max_attempts {
      if attempt > 0 {
        let backoff = self.config.backoff_for_attempt(attempt - 1);
        debug!(op, attempt, ?backoff, "retrying upstream call");
        self.retries.fetch_add(1, Ordering::Relaxed);
        sleep(backoff).await;
      }

      match tokio::time::timeout(self.config.fetch_timeout, call()).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(error)) => {
          if is_retryable(&error) && attempt + 1 < self.config.max_attempts {
            warn!(op, attempt, %error, "retryable upstream error");
            last_error = Some(error);
            continue;
          }
          return Err(error);
        }
        Err(_) => {
          warn!(op, attempt, "upstream call timed out");
          last_error = Some(UpstreamError::Timeout);
        }
      }
    }

    Err(last_error.unwrap_or(UpstreamError::Timeout))
  }
}

#[async_trait]
impl<S: LinkSource> LinkSource for ResilientSource<S> {
  async fn forward_links(&self, title: &Title) -> Result<HashSet<Title>> {
    self.with_retry("forward_links", || self.inner.forward_links(title)).await
  }

  async fn backward_links(&self, title: &Title) -> Result<HashSet<Title>> {
    self.with_retry("backward_links", || self.inner.backward_links(title)).await
  }

  async fn resolve(&self, term: &str) -> Result<Title> {
    self.with_retry("resolve", || self.inner.resolve(term)).await
  }

  fn counters(&self) -> CounterSnapshot {
    let mut snapshot = self.inner.counters();
    snapshot.retries += self.retries.load(Ordering::Relaxed);
    snapshot
  }
}
