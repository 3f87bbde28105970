//! In-memory item store, partitioned by scope.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::collection::Collection;
use super::traits::Cacheable;
use crate::error::{SyncError, SyncResult};

/// A cached collection together with the time it was last fetched.
#[derive(Debug, Clone)]
pub struct CachedCollection<T> {
  /// The cached entities in order
  pub items: Collection<T>,
  /// When the collection was last populated from the network
  pub cached_at: DateTime<Utc>,
}

/// Per-scope slot, created by the first fetch.
type Slot<T> = Arc<Mutex<CachedCollection<T>>>;

/// Session-lifetime store holding one collection per scope (viewing user).
///
/// Each scope has its own mutex, so a write for one user never blocks a
/// reader of another. Readers clone under the lock and never observe a
/// partially written collection.
pub struct ItemStore<T: Cacheable> {
  slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T: Cacheable> Default for ItemStore<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Cacheable> ItemStore<T> {
  pub fn new() -> Self {
    Self {
      slots: Mutex::new(HashMap::new()),
    }
  }

  fn slots(&self) -> SyncResult<std::sync::MutexGuard<'_, HashMap<String, Slot<T>>>> {
    self
      .slots
      .lock()
      .map_err(|e| SyncError::LockPoisoned(e.to_string()))
  }

  fn slot(&self, scope: &str) -> SyncResult<Option<Slot<T>>> {
    Ok(self.slots()?.get(scope).map(Arc::clone))
  }

  /// Run `f` with exclusive access to a scope's cached collection.
  ///
  /// Nothing else can read or write the scope until `f` returns. `f` must not
  /// block or await. Fails with `NotCached` if the scope was never written.
  pub(crate) fn transact<R>(
    &self,
    scope: &str,
    f: impl FnOnce(&mut CachedCollection<T>) -> SyncResult<R>,
  ) -> SyncResult<R> {
    let slot = self.slot(scope)?.ok_or_else(|| SyncError::NotCached {
      scope: scope.to_string(),
    })?;
    let mut guard = slot
      .lock()
      .map_err(|e| SyncError::LockPoisoned(e.to_string()))?;
    f(&mut *guard)
  }

  /// Current cached collection for a scope.
  pub fn read(&self, scope: &str) -> SyncResult<CachedCollection<T>> {
    self.transact(scope, |cached| Ok(cached.clone()))
  }

  /// Whether a fetch has populated this scope.
  pub fn is_cached(&self, scope: &str) -> bool {
    self.read(scope).is_ok()
  }

  /// Replace the whole collection for a scope and mark it freshly fetched.
  pub(crate) fn write(&self, scope: &str, items: Collection<T>) -> SyncResult<()> {
    let cached = CachedCollection {
      items,
      cached_at: Utc::now(),
    };

    let existing = {
      let mut slots = self.slots()?;
      match slots.get(scope) {
        Some(slot) => Arc::clone(slot),
        None => {
          slots.insert(scope.to_string(), Arc::new(Mutex::new(cached)));
          return Ok(());
        }
      }
    };

    let mut guard = existing
      .lock()
      .map_err(|e| SyncError::LockPoisoned(e.to_string()))?;
    *guard = cached;
    Ok(())
  }

  /// Drop the cached collection for a scope (e.g., on sign-out).
  pub fn evict(&self, scope: &str) -> SyncResult<()> {
    self.slots()?.remove(scope);
    Ok(())
  }
}
