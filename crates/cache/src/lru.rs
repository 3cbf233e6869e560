//! A strict least-recently-used map.
//!
//! Every read and write moves the entry to most-recently-used; when the map
//! overflows its capacity, the exact least-recently-used entry is evicted.
//! Recency is tracked with a monotonic counter: `order` maps counter values
//! to keys, so the smallest counter is always the LRU entry and all
//! operations stay O(log n).

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

#[derive(Debug)]
pub struct LruMap<K, V> {
  capacity: usize,
  entries: HashMap<K, Slot<V>>,
  order: BTreeMap<u64, K>,
  tick: u64,
}

#[derive(Debug)]
struct Slot<V> {
  value: V,
  tick: u64,
}

impl<K: Eq + Hash + Clone, V> LruMap<K, V> {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
      entries: HashMap::new(),
      order: BTreeMap::new(),
      tick: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn contains(&self, key: &K) -> bool {
    self.entries.contains_key(key)
  }

  /// Read without touching recency.
  pub fn peek(&self, key: &K) -> Option<&V> {
    self.entries.get(key).map(|slot| &slot.value)
  }

  /// Read and mark as most recently used.
  pub fn get(&mut self, key: &K) -> Option<&V> {
    self.touch(key)?;
    self.entries.get(key).map(|slot| &slot.value)
  }

  /// Mutable read, marking as most recently used.
  pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
    self.touch(key)?;
    self.entries.get_mut(key).map(|slot| &mut slot.value)
  }

  /// Insert or replace, marking as most recently used. Returns the evicted
  /// LRU entry when the insert pushed the map over capacity.
  pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
    self.tick += 1;
    let tick = self.tick;

    if let Some(old) = self.entries.insert(
      key.clone(),
      Slot { value, tick },
    ) {
      self.order.remove(&old.tick);
      self.order.insert(tick, key);
      return None;
    }
    self.order.insert(tick, key);

    if self.entries.len() > self.capacity {
      let (_, lru_key) = self.order.pop_first()?;
      let slot = self.entries.remove(&lru_key)?;
      return Some((lru_key, slot.value));
    }
    None
  }

  pub fn remove(&mut self, key: &K) -> Option<V> {
    let slot = self.entries.remove(key)?;
    self.order.remove(&slot.tick);
    Some(slot.value)
  }

  /// Keys from most to least recently used.
  pub fn keys_mru(&self) -> impl Iterator<Item = &K> {
    self.order.values().rev()
  }

  fn touch(&mut self, key: &K) -> Option<()> {
    let slot = self.entries.get_mut(key)?;
    self.order.remove(&slot.tick);
    self.tick += 1;
    slot.tick = self.tick;
    self.order.insert(self.tick, key.clone());
    Some(())
  }
}
