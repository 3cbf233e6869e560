//! Cache-aware bidirectional breadth-first search.
//!
//! Two frontiers grow toward each other, the smaller one expanding by a full
//! layer per step. Layer fetches run concurrently under the upstream
//! client's cap. Meetings between the frontiers become candidate paths for
//! the diversity extractor.
//!
//! Cancellation and the request deadline are observed at layer boundaries
//! only, so in-flight fetches complete and a `progress` event always
//! reflects a consistent depth/pages pair.

use crate::events::EventSink;
use crate::extractor::DiversePathExtractor;
use crate::frontier::{Direction, Frontier};
use cache::SegmentCache;
use futures::future::join_all;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use upstream::{LinkSource, UpstreamError};
use wikigraph_core::{Path, PathFound, ProgressInfo, SearchConfig, SearchEvent, Title};

/// How one search run ended.
pub(crate) enum Outcome {
  Found {
    /// Accepted paths, shortest first, with their diversity scores.
    paths: Vec<(Path, Option<f64>)>,
    /// True when the search stopped early (upstream failure or page
    /// ceiling) with paths already in hand.
    partial: bool,
  },
  NoPath,
  TimedOut,
  Cancelled,
  UpstreamFailed(UpstreamError),
}

struct Meeting {
  node: Title,
  parent: Title,
}

pub(crate) struct SearchRun<'a> {
  source: &'a dyn LinkSource,
  cache: &'a SegmentCache,
  config: &'a SearchConfig,
  sink: &'a EventSink,
  cancel: &'a CancellationToken,
  started: Instant,
  pages_checked: u64,
  progress_mark: Instant,
  pages_at_mark: u64,
}

impl<'a> SearchRun<'a> {
  pub fn new(
    source: &'a dyn LinkSource,
    cache: &'a SegmentCache,
    config: &'a SearchConfig,
    sink: &'a EventSink,
    cancel: &'a CancellationToken,
    started: Instant,
  ) -> Self {
    Self {
      source,
      cache,
      config,
      sink,
      cancel,
      started,
      pages_checked: 0,
      progress_mark: started,
      pages_at_mark: 0,
    }
  }

  pub fn pages_checked(&self) -> u64 {
    self.pages_checked
  }

  pub async fn run(&mut self, start: &Title, end: &Title, max_paths: usize, min_diversity: f64) -> Outcome {
    let mut extractor = DiversePathExtractor::new(max_paths, min_diversity);

    if start == end {
      return Outcome::Found {
        paths: vec![(Path::single(start.clone()), None)],
        partial: false,
      };
    }

    // Cache-first: a hit is only trusted after every edge revalidates
    // against the live graph.
    if let Some(cached) = self.cache.lookup(start, end).await {
      if self.revalidate(&cached).await {
        info!(%start, %end, hops = cached.hops(), "validated cached path");
        let meeting = cached.titles()[cached.titles().len() / 2].clone();
        if let Some(accepted) = extractor.offer(cached.clone()) {
          self.emit_path_found(&cached, meeting, accepted.index).await;
        }
        if extractor.is_full() {
          return Outcome::Found {
            paths: extractor.into_paths(),
            partial: false,
          };
        }
      } else {
        debug!(%start, %end, "cached path is stale, invalidating");
        self.cache.invalidate(start, end).await;
      }
    }

    let mut forward = Frontier::new(start.clone(), Direction::Forward);
    let mut backward = Frontier::new(end.clone(), Direction::Backward);
    let mut truncated = false;

    loop {
      // Layer boundary: the only places cancellation and the deadline are
      // observed.
      if self.cancel.is_cancelled() {
        info!(%start, %end, "search cancelled");
        return Outcome::Cancelled;
      }
      if self.started.elapsed() >= self.config.request_timeout {
        return Outcome::TimedOut;
      }
      if extractor.is_full() {
        break;
      }

      let next_total = forward.depth() + backward.depth() + 1;
      if next_total > self.config.max_depth {
        break;
      }
      if let Some(shortest) = extractor.shortest_hops() {
        if next_total > shortest + self.config.diversity_slack {
          break;
        }
      }
      if self.pages_checked >= self.config.pages_checked_ceiling {
        warn!(pages = self.pages_checked, "page ceiling reached, truncating search");
        truncated = true;
        break;
      }

      // Expand the smaller non-empty frontier; forward wins ties.
      let both_empty = forward.layer_len() == 0 && backward.layer_len() == 0;
      if both_empty {
        break;
      }
      let expand_forward = if backward.layer_len() == 0 {
        true
      } else if forward.layer_len() == 0 {
        false
      } else {
        forward.layer_len() <= backward.layer_len()
      };

      let expansion = if expand_forward {
        self.expand(&mut forward, &backward).await
      } else {
        self.expand(&mut backward, &forward).await
      };

      let meetings = match expansion {
        Ok(meetings) => meetings,
        Err(err) => {
          warn!(%err, "upstream failure during expansion");
          if extractor.is_empty() {
            return Outcome::UpstreamFailed(err);
          }
          return Outcome::Found {
            paths: extractor.into_paths(),
            partial: true,
          };
        }
      };

      for meeting in meetings {
        let Some(candidate) = reconstruct(&forward, &backward, &meeting.node) else {
          // A repeated title means the two halves overlap; discard.
          continue;
        };
        if candidate.hops() > self.config.max_depth {
          continue;
        }
        if let Some(shortest) = extractor.shortest_hops() {
          if candidate.hops() > shortest + self.config.diversity_slack {
            continue;
          }
        }
        if let Some(accepted) = extractor.offer(candidate.clone()) {
          self.emit_path_found(&candidate, meeting.node, accepted.index).await;
          if extractor.is_full() {
            break;
          }
        }
      }

      self.emit_progress(forward.depth(), backward.depth());
    }

    if extractor.is_empty() {
      Outcome::NoPath
    } else {
      Outcome::Found {
        paths: extractor.into_paths(),
        partial: truncated,
      }
    }
  }

  /// Fetch one layer of the given frontier concurrently and admit the
  /// discoveries. Returns the meetings with the opposite frontier, ordered
  /// lexicographically for determinism.
  async fn expand(&mut self, frontier: &mut Frontier, other: &Frontier) -> upstream::Result<Vec<Meeting>> {
    let layer = frontier.layer().to_vec();
    let direction = frontier.direction();
    let source = self.source;

    let results = join_all(layer.iter().map(|title| async move {
      match direction {
        Direction::Forward => source.forward_links(title).await,
        Direction::Backward => source.backward_links(title).await,
      }
    }))
    .await;

    self.pages_checked += layer.len() as u64;

    let mut meetings = Vec::new();
    let mut next_layer = Vec::new();

    for (parent, result) in layer.iter().zip(results) {
      let mut neighbors: Vec<Title> = match result {
        Ok(set) => set.into_iter().collect(),
        Err(UpstreamError::TitleUnknown(title)) => {
          // The page vanished mid-search; treat as a dead end.
          debug!(%title, "page disappeared during expansion");
          Vec::new()
        }
        Err(err) => return Err(err),
      };
      neighbors.sort();

      for neighbor in neighbors {
        if frontier.contains(&neighbor) {
          continue;
        }
        if other.contains(&neighbor) {
          meetings.push(Meeting {
            node: neighbor.clone(),
            parent: parent.clone(),
          });
        }
        frontier.insert(neighbor.clone(), parent.clone());
        next_layer.push(neighbor);
      }
    }

    frontier.finish_layer(next_layer);
    meetings.sort_by(|a, b| (&a.node, &a.parent).cmp(&(&b.node, &b.parent)));
    Ok(meetings)
  }

  /// Check every edge of a cached path with one concurrent batch of
  /// forward-link fetches.
  async fn revalidate(&mut self, path: &Path) -> bool {
    if path.hops() == 0 {
      return true;
    }
    let titles = path.titles();
    let sources = &titles[..titles.len() - 1];

    let results = join_all(sources.iter().map(|title| self.source.forward_links(title))).await;
    self.pages_checked += sources.len() as u64;

    path.edges().zip(results).all(|((_, to), result)| match result {
      Ok(links) => links.contains(to),
      Err(_) => false,
    })
  }

  async fn emit_path_found(&self, path: &Path, meeting_point: Title, index: usize) {
    self
      .sink
      .send(SearchEvent::PathFound(PathFound {
        path: path.clone(),
        meeting_point,
        length: path.hops(),
        index,
      }))
      .await;
  }

  fn emit_progress(&mut self, forward_depth: usize, backward_depth: usize) {
    let now = Instant::now();
    let window = now.duration_since(self.progress_mark).as_secs_f64();
    let pages = self.pages_checked - self.pages_at_mark;
    let pages_per_second = if window > 0.0 { (pages as f64 / window) as u64 } else { 0 };

    self.sink.send_progress(ProgressInfo {
      forward_depth,
      backward_depth,
      pages_checked: self.pages_checked,
      pages_per_second,
      elapsed_ms: self.started.elapsed().as_millis() as u64,
    });

    self.progress_mark = now;
    self.pages_at_mark = self.pages_checked;
  }
}

/// Join the two parent chains at a meeting title into a full path.
fn reconstruct(forward: &Frontier, backward: &Frontier, meeting: &Title) -> Option<Path> {
  let mut titles = forward.chain(meeting)?;
  titles.reverse();
  let tail = backward.chain(meeting)?;
  titles.extend(tail.into_iter().skip(1));
  Path::new(titles).ok()
}
