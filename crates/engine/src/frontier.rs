//! BFS frontier with parent tracking for path reconstruction.

use std::collections::HashMap;
use wikigraph_core::Title;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Forward,
  Backward,
}

/// One side of the bidirectional search.
///
/// `parents` records, for every title ever admitted, its predecessor on the
/// shortest known path back to the root. `layer` is the rim that the next
/// expansion will fetch.
pub struct Frontier {
  direction: Direction,
  parents: HashMap<Title, Option<Title>>,
  layer: Vec<Title>,
  depth: usize,
}

impl Frontier {
  pub fn new(root: Title, direction: Direction) -> Self {
    let mut parents = HashMap::new();
    parents.insert(root.clone(), None);
    Self {
      direction,
      parents,
      layer: vec![root],
      depth: 0,
    }
  }

  pub fn direction(&self) -> Direction {
    self.direction
  }

  pub fn depth(&self) -> usize {
    self.depth
  }

  pub fn layer(&self) -> &[Title] {
    &self.layer
  }

  pub fn layer_len(&self) -> usize {
    self.layer.len()
  }

  /// Titles admitted so far, across all layers.
  pub fn visited(&self) -> usize {
    self.parents.len()
  }

  pub fn contains(&self, title: &Title) -> bool {
    self.parents.contains_key(title)
  }

  /// Admit a newly discovered title. Returns false if it was already present
  /// (the earlier admission is on a shorter or equal route, so it wins).
  pub fn insert(&mut self, title: Title, parent: Title) -> bool {
    if self.parents.contains_key(&title) {
      return false;
    }
    self.parents.insert(title, Some(parent));
    true
  }

  /// Replace the current layer with the next one and advance the depth.
  pub fn finish_layer(&mut self, next: Vec<Title>) {
    self.layer = next;
    self.depth += 1;
  }

  /// Walk parents from `from` back to the root, inclusive of both.
  ///
  /// For a forward frontier the result runs from `from` back to the start;
  /// for a backward frontier it runs from `from` toward the end, which is
  /// already path order.
  pub fn chain(&self, from: &Title) -> Option<Vec<Title>> {
    let mut chain = Vec::new();
    let mut current = from;
    loop {
      chain.push(current.clone());
      match self.parents.get(current)? {
        Some(parent) => current = parent,
        None => return Some(chain),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn t(s: &str) -> Title {
    Title::normalize(s).unwrap()
  }

  #[test]
  fn starts_at_the_root() {
    let frontier = Frontier::new(t("A"), Direction::Forward);
    assert_eq!(frontier.depth(), 0);
    assert_eq!(frontier.layer(), &[t("A")]);
    assert!(frontier.contains(&t("A")));
    assert_eq!(frontier.chain(&t("A")), Some(vec![t("A")]));
  }

  #[test]
  fn first_admission_wins() {
    let mut frontier = Frontier::new(t("A"), Direction::Forward);
    assert!(frontier.insert(t("B"), t("A")));
    assert!(!frontier.insert(t("B"), t("C")));
    assert_eq!(frontier.chain(&t("B")), Some(vec![t("B"), t("A")]));
  }

  #[test]
  fn chain_walks_to_the_root() {
    let mut frontier = Frontier::new(t("A"), Direction::Forward);
    frontier.insert(t("B"), t("A"));
    frontier.insert(t("C"), t("B"));
    frontier.finish_layer(vec![t("B")]);
    frontier.finish_layer(vec![t("C")]);
    assert_eq!(frontier.depth(), 2);
    assert_eq!(frontier.chain(&t("C")), Some(vec![t("C"), t("B"), t("A")]));
    assert_eq!(frontier.chain(&t("Z")), None);
  }

  #[test]
  fn visited_counts_all_layers() {
    let mut frontier = Frontier::new(t("A"), Direction::Backward);
    frontier.insert(t("B"), t("A"));
    frontier.insert(t("C"), t("A"));
    assert_eq!(frontier.visited(), 3);
  }
}
