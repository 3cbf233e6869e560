//! Engine assembly and lifetime.
//!
//! Builds the whole stack from startup options: the retrying upstream
//! client, the durable store, the warmed segment cache with its maintenance
//! task, and the `PathFinder` facade. Shutdown cancels maintenance, which
//! performs a final flush of pending durable writes.

use crate::service::PathFinder;
use cache::{CacheConfig, SegmentCache};
use db::Database;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use upstream::{ClientConfig, LinkSource, ResilientSource, RetryConfig, WikipediaClient};
use wikigraph_core::SearchConfig;

/// Everything tunable, fixed at startup.
#[derive(Debug, Clone)]
pub struct EngineOptions {
  pub search: SearchConfig,
  pub cache: CacheConfig,
  pub client: ClientConfig,
  pub retry: RetryConfig,
  /// Database file; `None` runs without a durable tier.
  pub db_path: Option<PathBuf>,
  /// How many durable segments to preload at startup.
  pub warm_limit: usize,
}

impl Default for EngineOptions {
  fn default() -> Self {
    Self {
      search: SearchConfig::default(),
      cache: CacheConfig::default(),
      client: ClientConfig::default(),
      retry: RetryConfig::default(),
      db_path: None,
      warm_limit: 1000,
    }
  }
}

/// A running engine and the handles needed to stop it cleanly.
pub struct EngineHandle {
  pub finder: Arc<PathFinder>,
  cancel: CancellationToken,
  maintenance: Option<JoinHandle<()>>,
}

impl EngineHandle {
  /// Stop background maintenance, flushing pending cache writes first.
  pub async fn shutdown(mut self) {
    self.cancel.cancel();
    if let Some(task) = self.maintenance.take() {
      let _ = task.await;
    }
    info!("engine shut down");
  }
}

/// Start the engine against the real upstream encyclopedia.
pub async fn start(options: EngineOptions) -> db::Result<EngineHandle> {
  let client = WikipediaClient::with_config(options.client.clone());
  let source: Arc<dyn LinkSource> = Arc::new(ResilientSource::with_config(client, options.retry.clone()));
  start_with_source(source, options).await
}

/// Start the engine with a caller-supplied link source (tests, replays).
pub async fn start_with_source(source: Arc<dyn LinkSource>, options: EngineOptions) -> db::Result<EngineHandle> {
  let store = match &options.db_path {
    Some(path) => Some(Arc::new(Database::open(path)?)),
    None => None,
  };

  let cache = Arc::new(SegmentCache::new(options.cache.clone(), store.clone()));
  let warmed = cache.warm(options.warm_limit).await?;

  let cancel = CancellationToken::new();
  let maintenance = store
    .is_some()
    .then(|| Arc::clone(&cache).spawn_maintenance(cancel.clone()));

  info!(warmed, durable = store.is_some(), "engine started");

  let finder = Arc::new(PathFinder::new(source, cache, store, options.search));
  Ok(EngineHandle {
    finder,
    cancel,
    maintenance,
  })
}
