//! The `PathFinder` facade: one shared engine serving many requests.
//!
//! Each request gets an isolated search task, event channel, and
//! cancellation token; the segment cache, upstream client, and durable store
//! are shared. An HTTP layer mounts `start_search` for the streaming
//! endpoint and the history accessors for everything else.

use crate::events::{self, EventSink, EventStream};
use crate::search::{Outcome, SearchRun};
use cache::{CacheStats, SegmentCache};
use db::{Database, NewSearchRecord, PathRow, SearchAggregates, SearchDetail, SearchSummary};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use upstream::{CounterSnapshot, LinkSource, UpstreamError};
use wikigraph_core::{
  CompleteInfo, ErrorInfo, ErrorKind, MergedGraph, PathSet, ResolvedTitles, ResolvingInfo, SearchConfig, SearchEvent,
  SearchRequest, SearchStats, StartInfo,
};

/// Shared search engine.
pub struct PathFinder {
  source: Arc<dyn LinkSource>,
  cache: Arc<SegmentCache>,
  store: Option<Arc<Database>>,
  config: SearchConfig,
}

/// A running search: the subscriber's event stream plus control over the
/// request's task tree.
pub struct SearchHandle {
  pub events: EventStream,
  cancel: CancellationToken,
  task: JoinHandle<()>,
}

impl SearchHandle {
  /// Token that cancels the search at its next layer boundary. The HTTP
  /// layer triggers this on client disconnect.
  pub fn cancel_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Wait for the search task itself to finish. Mostly useful in tests.
  pub async fn join(self) {
    let _ = self.task.await;
  }
}

impl PathFinder {
  pub fn new(
    source: Arc<dyn LinkSource>,
    cache: Arc<SegmentCache>,
    store: Option<Arc<Database>>,
    config: SearchConfig,
  ) -> Self {
    Self {
      source,
      cache,
      store,
      config,
    }
  }

  /// Launch a search and hand back its event stream.
  pub fn start_search(&self, request: SearchRequest) -> SearchHandle {
    let (sink, events) = events::channel(self.config.event_buffer, self.config.keepalive_interval);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_request(
      Arc::clone(&self.source),
      Arc::clone(&self.cache),
      self.store.clone(),
      self.config.clone(),
      request,
      sink,
      cancel.clone(),
    ));

    SearchHandle { events, cancel, task }
  }

  /// One historical search with its paths.
  pub async fn record(&self, id: i64) -> db::Result<Option<SearchDetail>> {
    let Some(store) = &self.store else {
      return Ok(None);
    };
    let store = Arc::clone(store);
    run_blocking(move || store.search_by_id(id)).await
  }

  /// Recent searches, optionally filtered by a term substring.
  pub async fn recent(&self, query: Option<String>, limit: usize, offset: usize) -> db::Result<Vec<SearchSummary>> {
    let Some(store) = &self.store else {
      return Ok(Vec::new());
    };
    let store = Arc::clone(store);
    run_blocking(move || store.recent_searches(query.as_deref(), limit, offset)).await
  }

  /// Aggregate statistics across all recorded searches.
  pub async fn stats(&self) -> db::Result<SearchAggregates> {
    let Some(store) = &self.store else {
      return Ok(SearchAggregates::default());
    };
    let store = Arc::clone(store);
    run_blocking(move || store.search_stats()).await
  }

  pub fn cache_stats(&self) -> CacheStats {
    self.cache.stats()
  }

  pub fn upstream_counters(&self) -> CounterSnapshot {
    self.source.counters()
  }
}

async fn run_blocking<T, F>(f: F) -> db::Result<T>
where
  T: Send + 'static,
  F: FnOnce() -> db::Result<T> + Send + 'static,
{
  match tokio::task::spawn_blocking(f).await {
    Ok(result) => result,
    Err(err) => {
      warn!(%err, "blocking database task panicked");
      Err(db::DbError::Poisoned)
    }
  }
}

#[allow(clippy::too_many_arguments)]
async fn run_request(
  source: Arc<dyn LinkSource>,
  cache: Arc<SegmentCache>,
  store: Option<Arc<Database>>,
  config: SearchConfig,
  request: SearchRequest,
  sink: EventSink,
  cancel: CancellationToken,
) {
  sink
    .send(SearchEvent::Start(StartInfo {
      start: request.start.clone(),
      end: request.end.clone(),
      max_paths: request.max_paths,
      min_diversity: request.min_diversity,
    }))
    .await;

  let validated = match request.validate() {
    Ok(validated) => validated,
    Err(err) => {
      sink
        .send(SearchEvent::Error(ErrorInfo {
          kind: ErrorKind::InvalidInput,
          message: err.to_string(),
        }))
        .await;
      return;
    }
  };

  let started = Instant::now();
  info!(start = %validated.start_term, end = %validated.end_term, max_paths = validated.max_paths, "starting path search");

  sink
    .send(SearchEvent::Resolving(ResolvingInfo {
      message: "Resolving article titles...".to_string(),
    }))
    .await;

  // Equal endpoints short-circuit everything, including resolution, so the
  // request issues no upstream calls at all.
  let (resolved_start, resolved_end) = if validated.start == validated.end {
    (validated.start.clone(), validated.end.clone())
  } else {
    let start = match source.resolve(&validated.start_term).await {
      Ok(title) => title,
      Err(err) => {
        sink.send(resolution_error(&validated.start_term, err)).await;
        return;
      }
    };
    let end = match source.resolve(&validated.end_term).await {
      Ok(title) => title,
      Err(err) => {
        sink.send(resolution_error(&validated.end_term, err)).await;
        return;
      }
    };
    (start, end)
  };

  sink
    .send(SearchEvent::Resolved(ResolvedTitles {
      start: resolved_start.clone(),
      end: resolved_end.clone(),
    }))
    .await;

  let mut run = SearchRun::new(source.as_ref(), &cache, &config, &sink, &cancel, started);
  let outcome = run
    .run(&resolved_start, &resolved_end, validated.max_paths, validated.min_diversity)
    .await;
  let pages_checked = run.pages_checked();
  let elapsed_ms = started.elapsed().as_millis() as u64;

  let base_record = NewSearchRecord {
    start_term: validated.start_term.clone(),
    end_term: validated.end_term.clone(),
    resolved_start: Some(resolved_start.as_str().to_string()),
    resolved_end: Some(resolved_end.as_str().to_string()),
    success: false,
    error_message: None,
    pages_checked,
    elapsed_ms,
  };

  match outcome {
    Outcome::Found { paths, partial } => {
      for (path, _) in &paths {
        if path.hops() > 0 {
          cache.insert(path);
        }
      }

      let record = NewSearchRecord {
        success: true,
        ..base_record
      };
      let rows: Vec<PathRow> = paths
        .iter()
        .map(|(path, diversity_score)| PathRow {
          titles: path.titles().iter().map(|t| t.as_str().to_string()).collect(),
          diversity_score: *diversity_score,
        })
        .collect();
      let record_id = persist(&store, record, rows).await;

      let set = PathSet::new(paths.into_iter().map(|(path, _)| path).collect());
      let graph = MergedGraph::from_path_set(&set);
      let paths_found = set.len();
      info!(paths_found, pages_checked, elapsed_ms, partial, "search complete");

      sink
        .send(SearchEvent::Complete(Box::new(CompleteInfo {
          paths: set.paths().to_vec(),
          graph,
          stats: SearchStats {
            record_id,
            paths_found,
            pages_checked,
            elapsed_ms,
            partial,
          },
        })))
        .await;
    }
    Outcome::NoPath => {
      let message = format!("no path found within {} hops", config.max_depth);
      let record = NewSearchRecord {
        error_message: Some(message.clone()),
        ..base_record
      };
      let _ = persist(&store, record, Vec::new()).await;
      sink
        .send(SearchEvent::Error(ErrorInfo {
          kind: ErrorKind::NoPath,
          message,
        }))
        .await;
    }
    Outcome::TimedOut => {
      let message = format!("search exceeded its {} s budget", config.request_timeout.as_secs());
      let record = NewSearchRecord {
        error_message: Some(message.clone()),
        ..base_record
      };
      let _ = persist(&store, record, Vec::new()).await;
      sink
        .send(SearchEvent::Error(ErrorInfo {
          kind: ErrorKind::TimedOut,
          message,
        }))
        .await;
    }
    Outcome::UpstreamFailed(err) => {
      let message = format!("upstream unavailable: {err}");
      let record = NewSearchRecord {
        error_message: Some(message.clone()),
        ..base_record
      };
      let _ = persist(&store, record, Vec::new()).await;
      sink
        .send(SearchEvent::Error(ErrorInfo {
          kind: ErrorKind::UpstreamUnavailable,
          message,
        }))
        .await;
    }
    Outcome::Cancelled => {
      // The client is gone: nothing is emitted and nothing is persisted.
    }
  }
}

fn resolution_error(term: &str, err: UpstreamError) -> SearchEvent {
  match err {
    UpstreamError::TitleUnknown(_) => SearchEvent::Error(ErrorInfo {
      kind: ErrorKind::TitleUnknown,
      message: format!("could not find an article for '{term}'"),
    }),
    err => SearchEvent::Error(ErrorInfo {
      kind: ErrorKind::UpstreamUnavailable,
      message: format!("failed to resolve '{term}': {err}"),
    }),
  }
}

async fn persist(store: &Option<Arc<Database>>, record: NewSearchRecord, paths: Vec<PathRow>) -> Option<i64> {
  let store = store.as_ref()?;
  let store = Arc::clone(store);
  match run_blocking(move || store.save_search(&record, &paths)).await {
    Ok(id) => Some(id),
    Err(err) => {
      warn!(%err, "failed to persist search record");
      None
    }
  }
}
