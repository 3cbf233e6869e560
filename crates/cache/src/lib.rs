//! Two-tier cache of path segments.
//!
//! The in-memory tier is a strict LRU over (start, end) endpoint pairs; the
//! durable tier lives in the search database. Lookups fall through to the
//! durable tier on a memory miss and promote what they find. Inserts update
//! memory immediately and queue durable writes, which a background task
//! flushes in batches.
//!
//! A single mutex guards the memory tier and the write queue; durable reads
//! and writes run on the blocking pool.

mod lru;

pub use lru::LruMap;

use db::{Database, SegmentUpsert};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wikigraph_core::{Path, Title};

/// Tunables for the segment cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
  /// In-memory entry capacity (default: 10 000).
  pub capacity: usize,
  /// Longest sub-path stored as a segment, in titles (default: 10).
  pub max_segment_titles: usize,
  /// Flush cadence for queued durable writes (default: 500 ms).
  pub flush_interval: Duration,
  /// Queue length that triggers an early flush (default: 256).
  pub flush_batch: usize,
  /// Durable entries unused this long are compacted away (default: 30 days).
  pub ttl_days: u32,
  /// Hard cap on durable rows (default: 10 000).
  pub durable_cap: usize,
  /// Compaction cadence (default: 1 h).
  pub compact_interval: Duration,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      capacity: 10_000,
      max_segment_titles: 10,
      flush_interval: Duration::from_millis(500),
      flush_batch: 256,
      ttl_days: 30,
      durable_cap: 10_000,
      compact_interval: Duration::from_secs(3600),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
  pub size: usize,
  pub hits: u64,
  pub misses: u64,
  pub hit_rate: f64,
}

type Key = (String, String);

#[derive(Debug)]
struct Entry {
  titles: Vec<Title>,
  use_count: u64,
}

#[derive(Debug)]
enum PendingWrite {
  Upsert(SegmentUpsert),
  Touch(Key),
}

struct CacheInner {
  entries: LruMap<Key, Entry>,
  pending: Vec<PendingWrite>,
  hits: u64,
  misses: u64,
}

/// Shared, two-tier segment cache.
pub struct SegmentCache {
  inner: Mutex<CacheInner>,
  store: Option<Arc<Database>>,
  config: CacheConfig,
  flush_wake: Notify,
}

/// Enumerate every contiguous sub-path of 2..=`max_titles` titles.
///
/// Bounding the window keeps storage linear-ish in path length instead of
/// quadratic.
pub fn extract_segments(path: &Path, max_titles: usize) -> Vec<Vec<Title>> {
  let titles = path.titles();
  let n = titles.len();
  let max_titles = max_titles.max(2);
  let mut segments = Vec::new();
  for i in 0..n {
    let upper = (i + max_titles).min(n);
    for j in (i + 2)..=upper {
      segments.push(titles[i..j].to_vec());
    }
  }
  segments
}

fn key_for(start: &Title, end: &Title) -> Key {
  (start.as_str().to_string(), end.as_str().to_string())
}

impl SegmentCache {
  pub fn new(config: CacheConfig, store: Option<Arc<Database>>) -> Self {
    info!(
      capacity = config.capacity,
      durable = store.is_some(),
      "segment cache initialized"
    );
    Self {
      inner: Mutex::new(CacheInner {
        entries: LruMap::new(config.capacity),
        pending: Vec::new(),
        hits: 0,
        misses: 0,
      }),
      store,
      config,
      flush_wake: Notify::new(),
    }
  }

  pub fn in_memory(config: CacheConfig) -> Self {
    Self::new(config, None)
  }

  fn lock(&self) -> MutexGuard<'_, CacheInner> {
    // A poisoned cache lock means a panic mid-operation; the cache is an
    // accelerator, so continuing with the inner state is safe.
    match self.inner.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  /// Look up a segment for an endpoint pair.
  ///
  /// A memory hit moves the entry to most-recently-used and bumps its use
  /// count; a memory miss consults the durable tier and promotes any row it
  /// finds.
  pub async fn lookup(&self, start: &Title, end: &Title) -> Option<Path> {
    let key = key_for(start, end);

    {
      let mut inner = self.lock();
      if let Some(entry) = inner.entries.get_mut(&key) {
        entry.use_count += 1;
        let titles = entry.titles.clone();
        inner.hits += 1;
        if self.store.is_some() {
          inner.pending.push(PendingWrite::Touch(key));
          self.maybe_wake(&inner);
        }
        debug!(start = %start, end = %end, "segment cache hit");
        return Path::new(titles).ok();
      }
      inner.misses += 1;
    }

    let store = self.store.as_ref()?;
    let db = Arc::clone(store);
    let (db_start, db_end) = key.clone();
    let loaded = tokio::task::spawn_blocking(move || db.get_segment(&db_start, &db_end)).await;

    let titles = match loaded {
      Ok(Ok(Some(titles))) => titles,
      Ok(Ok(None)) => return None,
      Ok(Err(err)) => {
        warn!(%err, "durable segment lookup failed");
        return None;
      }
      Err(err) => {
        warn!(%err, "segment lookup task panicked");
        return None;
      }
    };

    let titles: Vec<Title> = titles.iter().filter_map(|raw| Title::normalize(raw).ok()).collect();
    let path = Path::new(titles.clone()).ok()?;

    let mut inner = self.lock();
    inner.entries.insert(key, Entry { titles, use_count: 1 });
    debug!(start = %start, end = %end, "segment promoted from durable tier");
    Some(path)
  }

  /// Store every bounded sub-path of `path` as a segment.
  ///
  /// For endpoints that already have a segment, a longer path never replaces
  /// a shorter one.
  pub fn insert(&self, path: &Path) {
    if path.hops() == 0 {
      return;
    }
    let segments = extract_segments(path, self.config.max_segment_titles);

    let mut inner = self.lock();
    for titles in segments {
      let key = (
        titles[0].as_str().to_string(),
        titles[titles.len() - 1].as_str().to_string(),
      );

      let updated = match inner.entries.get_mut(&key) {
        Some(entry) => {
          entry.use_count += 1;
          if titles.len() <= entry.titles.len() {
            entry.titles = titles.clone();
          }
          true
        }
        None => false,
      };
      if !updated {
        inner.entries.insert(
          key.clone(),
          Entry {
            titles: titles.clone(),
            use_count: 1,
          },
        );
      }

      if self.store.is_some() {
        inner.pending.push(PendingWrite::Upsert(SegmentUpsert {
          start: key.0,
          end: key.1,
          titles: titles.iter().map(|t| t.as_str().to_string()).collect(),
        }));
      }
    }
    self.maybe_wake(&inner);
  }

  /// Drop the entry for an endpoint pair from both tiers.
  pub async fn invalidate(&self, start: &Title, end: &Title) {
    let key = key_for(start, end);
    self.lock().entries.remove(&key);

    if let Some(store) = &self.store {
      let db = Arc::clone(store);
      let result = tokio::task::spawn_blocking(move || db.delete_segment(&key.0, &key.1)).await;
      match result {
        Ok(Ok(removed)) => debug!(%start, %end, removed, "invalidated cached segment"),
        Ok(Err(err)) => warn!(%err, "failed to invalidate durable segment"),
        Err(err) => warn!(%err, "segment invalidation task panicked"),
      }
    }
  }

  /// Load up to `limit` most-recently-used durable rows into memory.
  pub async fn warm(&self, limit: usize) -> db::Result<usize> {
    let Some(store) = &self.store else {
      return Ok(0);
    };
    let db = Arc::clone(store);
    let rows = match tokio::task::spawn_blocking(move || db.recent_segments(limit)).await {
      Ok(rows) => rows?,
      Err(err) => {
        warn!(%err, "cache warm-up task panicked");
        return Ok(0);
      }
    };

    let mut loaded = 0;
    let mut inner = self.lock();
    // Rows arrive MRU-first; inserting in reverse keeps that order in the LRU.
    for row in rows.into_iter().rev() {
      let titles: Vec<Title> = row.titles.iter().filter_map(|raw| Title::normalize(raw).ok()).collect();
      if titles.len() < 2 {
        continue;
      }
      let key = (
        titles[0].as_str().to_string(),
        titles[titles.len() - 1].as_str().to_string(),
      );
      inner.entries.insert(
        key,
        Entry {
          titles,
          use_count: row.use_count,
        },
      );
      loaded += 1;
    }
    info!(loaded, "warmed segment cache from durable tier");
    Ok(loaded)
  }

  pub fn stats(&self) -> CacheStats {
    let inner = self.lock();
    let total = inner.hits + inner.misses;
    CacheStats {
      size: inner.entries.len(),
      hits: inner.hits,
      misses: inner.misses,
      hit_rate: if total == 0 { 0.0 } else { inner.hits as f64 / total as f64 },
    }
  }

  /// Whether an endpoint pair is present in the memory tier (no touch).
  pub fn contains(&self, start: &Title, end: &Title) -> bool {
    self.lock().entries.contains(&key_for(start, end))
  }

  /// Write all queued durable operations now. Returns how many were flushed.
  pub async fn flush(&self) -> usize {
    let ops = std::mem::take(&mut self.lock().pending);
    let Some(store) = &self.store else {
      return 0;
    };
    if ops.is_empty() {
      return 0;
    }

    let count = ops.len();
    let db = Arc::clone(store);
    let result = tokio::task::spawn_blocking(move || {
      let mut upserts = Vec::new();
      let mut touches = Vec::new();
      for op in ops {
        match op {
          PendingWrite::Upsert(upsert) => upserts.push(upsert),
          PendingWrite::Touch(key) => touches.push(key),
        }
      }
      db.upsert_segments(&upserts)?;
      db.touch_segments(&touches)
    })
    .await;

    match result {
      Ok(Ok(())) => count,
      Ok(Err(err)) => {
        warn!(%err, "segment flush failed");
        0
      }
      Err(err) => {
        warn!(%err, "segment flush task panicked");
        0
      }
    }
  }

  /// Run durable-tier compaction once.
  pub async fn compact(&self) -> usize {
    let Some(store) = &self.store else {
      return 0;
    };
    let db = Arc::clone(store);
    let ttl = self.config.ttl_days;
    let cap = self.config.durable_cap;
    match tokio::task::spawn_blocking(move || db.compact_segments(ttl, cap)).await {
      Ok(Ok(removed)) => removed,
      Ok(Err(err)) => {
        warn!(%err, "segment compaction failed");
        0
      }
      Err(err) => {
        warn!(%err, "segment compaction task panicked");
        0
      }
    }
  }

  /// Spawn the background flusher/compactor. It flushes every
  /// `flush_interval`, early when the queue reaches `flush_batch`, compacts
  /// every `compact_interval`, and performs a final flush on shutdown.
  pub fn spawn_maintenance(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    let cache = self;
    tokio::spawn(async move {
      let mut flush_timer = interval(cache.config.flush_interval);
      let mut compact_timer = interval(cache.config.compact_interval);
      // Skip the immediate first ticks.
      flush_timer.tick().await;
      compact_timer.tick().await;

      loop {
        tokio::select! {
          _ = flush_timer.tick() => {
            cache.flush().await;
          }
          _ = cache.flush_wake.notified() => {
            cache.flush().await;
          }
          _ = compact_timer.tick() => {
            cache.compact().await;
          }
          _ = cancel.cancelled() => {
            cache.flush().await;
            debug!("segment cache maintenance stopped");
            break;
          }
        }
      }
    })
  }

  fn maybe_wake(&self, inner: &CacheInner) {
    if self.store.is_some() && inner.pending.len() >= self.config.flush_batch {
      self.flush_wake.notify_one();
    }
  }
}
