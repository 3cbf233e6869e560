//! Engine tunables, settable once at startup.

use std::time::Duration;

/// Knobs for the search engine itself. Upstream and cache tiers carry their
/// own configuration structs in their crates.
#[derive(Debug, Clone)]
pub struct SearchConfig {
  /// Maximum combined BFS depth before giving up (default: 6).
  pub max_depth: usize,
  /// Extra depth explored beyond the shortest path found, to surface
  /// alternative routes (default: 2).
  pub diversity_slack: usize,
  /// Hard ceiling on pages fetched for one request; the search truncates
  /// with whatever it has once exceeded (default: 50 000).
  pub pages_checked_ceiling: u64,
  /// Wall-clock budget for one request (default: 60 s).
  pub request_timeout: Duration,
  /// Bound of the per-subscriber event channel (default: 64).
  pub event_buffer: usize,
  /// Silence interval after which a keepalive frame is emitted (default: 15 s).
  pub keepalive_interval: Duration,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      max_depth: 6,
      diversity_slack: 2,
      pages_checked_ceiling: 50_000,
      request_timeout: Duration::from_secs(60),
      event_buffer: 64,
      keepalive_interval: Duration::from_secs(15),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_documented_values() {
    let config = SearchConfig::default();
    assert_eq!(config.max_depth, 6);
    assert_eq!(config.diversity_slack, 2);
    assert_eq!(config.pages_checked_ceiling, 50_000);
    assert_eq!(config.request_timeout, Duration::from_secs(60));
  }
}
