//! Shared fixtures: a scripted in-memory link graph standing in for the
//! upstream encyclopedia.

#![allow(dead_code)]

use async_trait::async_trait;
use cache::{CacheConfig, SegmentCache};
use engine::PathFinder;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use upstream::{CounterSnapshot, LinkSource, UpstreamError};
use wikigraph_core::{CompleteInfo, SearchConfig, SearchEvent, SearchRequest, Title};

pub fn t(s: &str) -> Title {
  Title::normalize(s).unwrap()
}

/// A deterministic link graph with optional scripted failures.
pub struct ScriptedSource {
  forward: HashMap<Title, HashSet<Title>>,
  backward: HashMap<Title, HashSet<Title>>,
  universe: HashSet<Title>,
  requests: AtomicU64,
  link_fetches: AtomicU64,
  /// Link fetches beyond this count fail with a 503.
  fail_links_after: Option<u64>,
}

impl ScriptedSource {
  pub fn from_edges(edges: &[(&str, &str)]) -> Self {
    let mut forward: HashMap<Title, HashSet<Title>> = HashMap::new();
    let mut backward: HashMap<Title, HashSet<Title>> = HashMap::new();
    let mut universe = HashSet::new();

    for (from, to) in edges {
      let from = t(from);
      let to = t(to);
      universe.insert(from.clone());
      universe.insert(to.clone());
      forward.entry(from.clone()).or_default().insert(to.clone());
      backward.entry(to).or_default().insert(from);
    }

    Self {
      forward,
      backward,
      universe,
      requests: AtomicU64::new(0),
      link_fetches: AtomicU64::new(0),
      fail_links_after: None,
    }
  }

  /// Add resolvable articles that have no links at all.
  pub fn with_titles(mut self, titles: &[&str]) -> Self {
    for title in titles {
      self.universe.insert(t(title));
    }
    self
  }

  /// Make every link fetch past the first `n` fail with a 503.
  pub fn fail_links_after(mut self, n: u64) -> Self {
    self.fail_links_after = Some(n);
    self
  }

  pub fn requests(&self) -> u64 {
    self.requests.load(Ordering::SeqCst)
  }

  fn check_link_budget(&self) -> Result<(), UpstreamError> {
    let fetch = self.link_fetches.fetch_add(1, Ordering::SeqCst);
    if let Some(limit) = self.fail_links_after {
      if fetch >= limit {
        return Err(UpstreamError::Status(503));
      }
    }
    Ok(())
  }
}

#[async_trait]
impl LinkSource for ScriptedSource {
  async fn forward_links(&self, title: &Title) -> upstream::Result<HashSet<Title>> {
    self.requests.fetch_add(1, Ordering::SeqCst);
    self.check_link_budget()?;
    Ok(self.forward.get(title).cloned().unwrap_or_default())
  }

  async fn backward_links(&self, title: &Title) -> upstream::Result<HashSet<Title>> {
    self.requests.fetch_add(1, Ordering::SeqCst);
    self.check_link_budget()?;
    Ok(self.backward.get(title).cloned().unwrap_or_default())
  }

  async fn resolve(&self, term: &str) -> upstream::Result<Title> {
    self.requests.fetch_add(1, Ordering::SeqCst);
    let title = Title::normalize(term).map_err(|_| UpstreamError::TitleUnknown(term.to_string()))?;
    if self.universe.contains(&title) {
      Ok(title)
    } else {
      Err(UpstreamError::TitleUnknown(term.to_string()))
    }
  }

  fn counters(&self) -> CounterSnapshot {
    CounterSnapshot {
      requests: self.requests(),
      ..Default::default()
    }
  }
}

pub fn request(start: &str, end: &str, max_paths: usize, min_diversity: f64) -> SearchRequest {
  SearchRequest {
    start: start.to_string(),
    end: end.to_string(),
    max_paths,
    min_diversity,
  }
}

pub fn finder(source: Arc<ScriptedSource>) -> PathFinder {
  finder_with_config(source, SearchConfig::default())
}

pub fn finder_with_config(source: Arc<ScriptedSource>, config: SearchConfig) -> PathFinder {
  let cache = Arc::new(SegmentCache::in_memory(CacheConfig::default()));
  PathFinder::new(source, cache, None, config)
}

/// Run one request to its terminal event and return everything emitted.
pub async fn run_search(finder: &PathFinder, request: SearchRequest) -> Vec<SearchEvent> {
  let mut handle = finder.start_search(request);
  let events = handle.events.collect_events().await;
  handle.join().await;
  events
}

pub fn complete_info(events: &[SearchEvent]) -> &CompleteInfo {
  match events.last() {
    Some(SearchEvent::Complete(info)) => info,
    other => panic!("expected a complete event, got {other:?}"),
  }
}

pub fn paths_as_strings(info: &CompleteInfo) -> Vec<Vec<String>> {
  info
    .paths
    .iter()
    .map(|path| path.titles().iter().map(|t| t.as_str().to_string()).collect())
    .collect()
}
