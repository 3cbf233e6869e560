//! Paths, path sets, and the merged result graph.

use crate::title::Title;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
  #[error("path is empty")]
  Empty,
  #[error("path repeats title: {0}")]
  RepeatedTitle(String),
}

/// An ordered, non-empty sequence of titles where each adjacent pair is a
/// link in the upstream graph. No title appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Title>", into = "Vec<Title>")]
pub struct Path {
  titles: Vec<Title>,
}

impl Path {
  pub fn new(titles: Vec<Title>) -> Result<Self, PathError> {
    if titles.is_empty() {
      return Err(PathError::Empty);
    }
    let mut seen = HashSet::with_capacity(titles.len());
    for title in &titles {
      if !seen.insert(title) {
        return Err(PathError::RepeatedTitle(title.to_string()));
      }
    }
    Ok(Path { titles })
  }

  /// The zero-hop path consisting of a single title.
  pub fn single(title: Title) -> Self {
    Path { titles: vec![title] }
  }

  pub fn titles(&self) -> &[Title] {
    &self.titles
  }

  /// Number of edges in the path.
  pub fn hops(&self) -> usize {
    self.titles.len() - 1
  }

  pub fn start(&self) -> &Title {
    &self.titles[0]
  }

  pub fn end(&self) -> &Title {
    &self.titles[self.titles.len() - 1]
  }

  /// Titles strictly between the endpoints.
  pub fn intermediates(&self) -> HashSet<&Title> {
    if self.titles.len() <= 2 {
      return HashSet::new();
    }
    self.titles[1..self.titles.len() - 1].iter().collect()
  }

  /// Adjacent (from, to) pairs.
  pub fn edges(&self) -> impl Iterator<Item = (&Title, &Title)> {
    self.titles.windows(2).map(|w| (&w[0], &w[1]))
  }
}

impl fmt::Display for Path {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for title in &self.titles {
      if !first {
        f.write_str(" -> ")?;
      }
      first = false;
      f.write_str(title.as_str())?;
    }
    Ok(())
  }
}

impl TryFrom<Vec<Title>> for Path {
  type Error = PathError;

  fn try_from(titles: Vec<Title>) -> Result<Self, Self::Error> {
    Path::new(titles)
  }
}

impl From<Path> for Vec<Title> {
  fn from(path: Path) -> Self {
    path.titles
  }
}

/// Jaccard set-distance between the intermediate titles of two paths.
///
/// Two paths with no intermediates at all (direct links) are considered
/// identical, so their distance is 0.
pub fn jaccard_distance(a: &Path, b: &Path) -> f64 {
  let ia = a.intermediates();
  let ib = b.intermediates();
  let union = ia.union(&ib).count();
  if union == 0 {
    return 0.0;
  }
  let intersection = ia.intersection(&ib).count();
  1.0 - intersection as f64 / union as f64
}

/// An ordered collection of diverse paths for one request.
///
/// The first element is always the shortest path found; the rest follow in
/// discovery order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSet {
  paths: Vec<Path>,
}

impl PathSet {
  pub fn new(paths: Vec<Path>) -> Self {
    PathSet { paths }
  }

  pub fn paths(&self) -> &[Path] {
    &self.paths
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }

  pub fn first(&self) -> Option<&Path> {
    self.paths.first()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Path> {
    self.paths.iter()
  }
}

/// A node in the merged result graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
  pub id: usize,
  pub title: Title,
  /// Indices of the paths in the set that pass through this node.
  pub paths: Vec<usize>,
}

/// An edge in the merged result graph, referencing node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
  pub from: usize,
  pub to: usize,
  /// Indices of the paths in the set that use this edge.
  pub paths: Vec<usize>,
}

/// Union of all nodes and edges across a path set, annotated with which
/// paths use each element. This is what the client renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedGraph {
  pub nodes: Vec<GraphNode>,
  pub edges: Vec<GraphEdge>,
}

impl MergedGraph {
  pub fn from_path_set(set: &PathSet) -> Self {
    let mut node_ids: HashMap<&Title, usize> = HashMap::new();
    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut edge_ids: HashMap<(usize, usize), usize> = HashMap::new();
    let mut edges: Vec<GraphEdge> = Vec::new();

    for (path_idx, path) in set.iter().enumerate() {
      for title in path.titles() {
        let id = *node_ids.entry(title).or_insert_with(|| {
          nodes.push(GraphNode {
            id: nodes.len(),
            title: title.clone(),
            paths: Vec::new(),
          });
          nodes.len() - 1
        });
        if nodes[id].paths.last() != Some(&path_idx) {
          nodes[id].paths.push(path_idx);
        }
      }
      for (from, to) in path.edges() {
        let from_id = node_ids[from];
        let to_id = node_ids[to];
        let id = *edge_ids.entry((from_id, to_id)).or_insert_with(|| {
          edges.push(GraphEdge {
            from: from_id,
            to: to_id,
            paths: Vec::new(),
          });
          edges.len() - 1
        });
        if edges[id].paths.last() != Some(&path_idx) {
          edges[id].paths.push(path_idx);
        }
      }
    }

    MergedGraph { nodes, edges }
  }
}
