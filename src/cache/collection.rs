//! Ordered, identity-keyed collection of cached entities.

use std::collections::HashSet;

use super::traits::Cacheable;

/// An ordered sequence of entities with unique cache keys.
///
/// Order is insertion order. Nothing here reorders entries; removal and
/// re-insertion by index are the only ways positions change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection<T> {
  items: Vec<T>,
}

impl<T> Default for Collection<T> {
  fn default() -> Self {
    Self { items: Vec::new() }
  }
}

impl<T: Cacheable> Collection<T> {
  pub fn new(items: Vec<T>) -> Self {
    Self { items }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, T> {
    self.items.iter()
  }

  pub fn as_slice(&self) -> &[T] {
    &self.items
  }

  pub fn into_vec(self) -> Vec<T> {
    self.items
  }

  /// Find an entity by key.
  pub fn get(&self, key: &str) -> Option<&T> {
    self.items.iter().find(|item| item.cache_key() == key)
  }

  /// Index of the entity with the given key.
  pub fn position(&self, key: &str) -> Option<usize> {
    self.items.iter().position(|item| item.cache_key() == key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.position(key).is_some()
  }

  /// Append an entity at the end.
  pub fn push(&mut self, item: T) {
    self.items.push(item);
  }

  /// Remove the entity with the given key, returning it with its former index.
  pub fn remove(&mut self, key: &str) -> Option<(usize, T)> {
    let index = self.position(key)?;
    Some((index, self.items.remove(index)))
  }

  /// Swap in `item` for the entry with the same key, keeping its position.
  ///
  /// Returns the replaced entity, or `None` (and leaves the collection
  /// untouched) when no entry matches.
  pub fn replace(&mut self, item: T) -> Option<T> {
    let index = self.position(item.cache_key())?;
    Some(std::mem::replace(&mut self.items[index], item))
  }

  /// Insert at `index`, clamped to the current length.
  pub fn insert_at(&mut self, index: usize, item: T) {
    let index = index.min(self.items.len());
    self.items.insert(index, item);
  }

  /// Verify key uniqueness and every entity's own invariants.
  pub fn validate(&self) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(self.items.len());
    for item in &self.items {
      if !seen.insert(item.cache_key()) {
        return Err(format!(
          "duplicate {} id `{}`",
          T::entity_type(),
          item.cache_key()
        ));
      }
      item
        .check()
        .map_err(|e| format!("{} `{}`: {}", T::entity_type(), item.cache_key(), e))?;
    }
    Ok(())
  }
}

impl<T: Cacheable> FromIterator<T> for Collection<T> {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    Self::new(iter.into_iter().collect())
  }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
  type Item = &'a T;
  type IntoIter = std::slice::Iter<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}
