//! Diversity-aware collection of candidate paths.

use wikigraph_core::{jaccard_distance, Path, PathSet};

/// Result of offering a candidate to the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
  /// Position of the path in the (shortest-first) accepted set.
  pub index: usize,
  /// Minimum Jaccard distance to the previously accepted paths; `None` for
  /// the first path.
  pub diversity: Option<f64>,
}

/// Accumulates up to `max_paths` mutually diverse paths.
///
/// The first candidate is always accepted. Later candidates are accepted iff
/// their minimum Jaccard distance (over intermediate titles) to every
/// accepted path reaches `min_diversity`. The shortest accepted path is kept
/// at the front; everything else stays in discovery order.
pub struct DiversePathExtractor {
  max_paths: usize,
  min_diversity: f64,
  accepted: Vec<(Path, Option<f64>)>,
}

impl DiversePathExtractor {
  pub fn new(max_paths: usize, min_diversity: f64) -> Self {
    Self {
      max_paths: max_paths.max(1),
      min_diversity,
      accepted: Vec::new(),
    }
  }

  pub fn is_full(&self) -> bool {
    self.accepted.len() >= self.max_paths
  }

  pub fn len(&self) -> usize {
    self.accepted.len()
  }

  pub fn is_empty(&self) -> bool {
    self.accepted.is_empty()
  }

  /// Hop count of the shortest accepted path so far.
  pub fn shortest_hops(&self) -> Option<usize> {
    self.accepted.first().map(|(path, _)| path.hops())
  }

  /// Offer a candidate. Returns where it landed if accepted.
  pub fn offer(&mut self, candidate: Path) -> Option<Accepted> {
    if self.is_full() {
      return None;
    }

    if self.accepted.is_empty() {
      self.accepted.push((candidate, None));
      return Some(Accepted {
        index: 0,
        diversity: None,
      });
    }

    let min_distance = self
      .accepted
      .iter()
      .map(|(path, _)| jaccard_distance(&candidate, path))
      .fold(f64::INFINITY, f64::min);

    if min_distance < self.min_diversity {
      return None;
    }

    // Keep the shortest path first; discovery order otherwise.
    let index = if candidate.hops() < self.accepted[0].0.hops() {
      self.accepted.insert(0, (candidate, Some(min_distance)));
      0
    } else {
      self.accepted.push((candidate, Some(min_distance)));
      self.accepted.len() - 1
    };

    Some(Accepted {
      index,
      diversity: Some(min_distance),
    })
  }

  /// Accepted paths with their diversity scores, shortest first.
  pub fn paths(&self) -> &[(Path, Option<f64>)] {
    &self.accepted
  }

  pub fn into_paths(self) -> Vec<(Path, Option<f64>)> {
    self.accepted
  }

  pub fn path_set(&self) -> PathSet {
    PathSet::new(self.accepted.iter().map(|(path, _)| path.clone()).collect())
  }
}
