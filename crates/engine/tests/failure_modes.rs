//! Upstream failures, timeouts, cancellation, and persistence behavior.

mod common;

use cache::{CacheConfig, SegmentCache};
use common::{complete_info, finder_with_config, paths_as_strings, request, run_search, ScriptedSource};
use db::Database;
use engine::PathFinder;
use std::sync::Arc;
use std::time::Duration;
use wikigraph_core::{ErrorKind, SearchConfig, SearchEvent};

fn diamond() -> ScriptedSource {
  ScriptedSource::from_edges(&[("A", "B"), ("A", "X"), ("B", "C"), ("X", "C")])
}

#[tokio::test]
async fn upstream_failure_before_any_path_is_an_error() {
  let source = Arc::new(diamond().fail_links_after(0));
  let finder = finder_with_config(source, SearchConfig::default());

  let events = run_search(&finder, request("A", "C", 1, 0.3)).await;
  match events.last() {
    Some(SearchEvent::Error(info)) => assert_eq!(info.kind, ErrorKind::UpstreamUnavailable),
    other => panic!("expected an upstream error, got {other:?}"),
  }
}

#[tokio::test]
async fn upstream_failure_after_a_path_completes_partially() {
  // The first two link fetches surface both diamond paths; asking for a
  // third path forces another expansion, which fails.
  let source = Arc::new(diamond().fail_links_after(2));
  let finder = finder_with_config(source, SearchConfig::default());

  let events = run_search(&finder, request("A", "C", 3, 0.3)).await;
  let info = complete_info(&events);
  assert_eq!(info.stats.paths_found, 2);
  assert!(info.stats.partial);
}

#[tokio::test]
async fn exhausted_time_budget_is_timed_out() {
  let source = Arc::new(diamond());
  let config = SearchConfig {
    request_timeout: Duration::ZERO,
    ..SearchConfig::default()
  };
  let finder = finder_with_config(source, config);

  let events = run_search(&finder, request("A", "C", 1, 0.3)).await;
  match events.last() {
    Some(SearchEvent::Error(info)) => assert_eq!(info.kind, ErrorKind::TimedOut),
    other => panic!("expected a timeout error, got {other:?}"),
  }
}

#[tokio::test]
async fn page_ceiling_truncates_with_what_was_found() {
  // A direct link is found on the first expansion; the ceiling then stops
  // the hunt for a second path.
  let source = Arc::new(ScriptedSource::from_edges(&[
    ("A", "D"),
    ("A", "B"),
    ("B", "C"),
    ("C", "D"),
  ]));
  let config = SearchConfig {
    pages_checked_ceiling: 1,
    ..SearchConfig::default()
  };
  let finder = finder_with_config(source, config);

  let events = run_search(&finder, request("A", "D", 2, 0.1)).await;
  let info = complete_info(&events);
  assert_eq!(paths_as_strings(info), vec![vec!["A", "D"]]);
  assert!(info.stats.partial);
}

#[tokio::test]
async fn cancellation_ends_the_stream_without_a_terminal_event() {
  let source = Arc::new(diamond());
  let store = Arc::new(Database::open_in_memory().unwrap());
  let cache = Arc::new(SegmentCache::in_memory(CacheConfig::default()));
  let finder = PathFinder::new(source, cache, Some(Arc::clone(&store)), SearchConfig::default());

  let mut handle = finder.start_search(request("A", "C", 1, 0.3));
  handle.cancel();
  let events = handle.events.collect_events().await;
  handle.join().await;

  assert!(!events.iter().any(|e| e.is_terminal()));
  // Nothing is persisted for an abandoned request.
  assert_eq!(store.search_stats().unwrap().total_searches, 0);
}

#[tokio::test]
async fn completed_searches_are_recorded() {
  let source = Arc::new(diamond());
  let store = Arc::new(Database::open_in_memory().unwrap());
  let cache = Arc::new(SegmentCache::in_memory(CacheConfig::default()));
  let finder = PathFinder::new(source, cache, Some(Arc::clone(&store)), SearchConfig::default());

  let events = run_search(&finder, request("A", "C", 2, 0.3)).await;
  let info = complete_info(&events);
  let record_id = info.stats.record_id.expect("record id on complete");

  let detail = finder.record(record_id).await.unwrap().expect("stored record");
  assert!(detail.success);
  assert_eq!(detail.resolved_start.as_deref(), Some("A"));
  assert_eq!(detail.paths.len(), 2);
  assert_eq!(detail.paths[0].titles, vec!["A", "B", "C"]);
  assert_eq!(detail.hops, 2);

  let stats = finder.stats().await.unwrap();
  assert_eq!(stats.total_searches, 1);
  assert_eq!(stats.successful_searches, 1);
}

#[tokio::test]
async fn failed_searches_are_recorded_too() {
  let source = Arc::new(ScriptedSource::from_edges(&[("A", "B")]).with_titles(&["C"]));
  let store = Arc::new(Database::open_in_memory().unwrap());
  let cache = Arc::new(SegmentCache::in_memory(CacheConfig::default()));
  let finder = PathFinder::new(source, cache, Some(Arc::clone(&store)), SearchConfig::default());

  let events = run_search(&finder, request("A", "C", 1, 0.3)).await;
  assert!(matches!(events.last(), Some(SearchEvent::Error(_))));

  let stats = finder.stats().await.unwrap();
  assert_eq!(stats.total_searches, 1);
  assert_eq!(stats.successful_searches, 0);

  let recent = finder.recent(None, 10, 0).await.unwrap();
  assert_eq!(recent.len(), 1);
  assert!(!recent[0].success);
}

#[tokio::test]
async fn stale_cached_paths_are_invalidated_and_replaced() {
  // Seed the cache with a route through Old, then remove that page's links
  // so revalidation fails and BFS finds the fresh route.
  let stale_source = Arc::new(ScriptedSource::from_edges(&[("A", "Old"), ("Old", "C")]));
  let cache = Arc::new(SegmentCache::in_memory(CacheConfig::default()));
  let seed = PathFinder::new(
    Arc::clone(&stale_source) as Arc<dyn upstream::LinkSource>,
    Arc::clone(&cache),
    None,
    SearchConfig::default(),
  );
  let events = run_search(&seed, request("A", "C", 1, 0.3)).await;
  assert_eq!(paths_as_strings(complete_info(&events)), vec![vec!["A", "Old", "C"]]);

  let fresh_source = Arc::new(ScriptedSource::from_edges(&[("A", "New"), ("New", "C")]));
  let finder = PathFinder::new(fresh_source, cache, None, SearchConfig::default());

  let events = run_search(&finder, request("A", "C", 1, 0.3)).await;
  assert_eq!(paths_as_strings(complete_info(&events)), vec![vec!["A", "New", "C"]]);
}
