//! Cache layer that orchestrates read-through caching with network fetching.

use chrono::{Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::collection::Collection;
use super::reconcile::Reconciler;
use super::store::ItemStore;
use super::traits::{CacheResult, Cacheable};
use crate::error::{SyncError, SyncResult, TransportError};

/// Cache layer that manages staleness and network fetching.
///
/// Reads go through here; all writes, including the population after a fetch,
/// go through the wrapped [`Reconciler`].
pub struct CacheLayer<T: Cacheable> {
  reconciler: Reconciler<T>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<T: Cacheable> CacheLayer<T> {
  /// Create a new cache layer over the given store.
  pub fn new(store: Arc<ItemStore<T>>) -> Self {
    Self {
      reconciler: Reconciler::new(store),
      stale_time: Duration::minutes(5),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn reconciler(&self) -> &Reconciler<T> {
    &self.reconciler
  }

  fn is_stale(&self, cached_at: chrono::DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.stale_time
  }

  /// Fetch a collection with cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, fetch from network
  /// 3. On network failure, return stale cache (offline mode)
  /// 4. Update cache with new data
  ///
  /// With nothing cached a network failure is returned as an error.
  pub async fn fetch_list<F, Fut>(
    &self,
    scope: &str,
    fetcher: F,
  ) -> SyncResult<CacheResult<Collection<T>>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, TransportError>>,
  {
    match self.reconciler.store().read(scope) {
      Ok(cached) => {
        if !self.is_stale(cached.cached_at) {
          debug!(scope, "cache hit");
          return Ok(CacheResult::from_cache(cached.items, cached.cached_at));
        }

        match fetcher().await {
          Ok(data) => self.install(scope, data),
          Err(e) => {
            warn!(scope, error = %e, "refetch failed, serving stale cache");
            Ok(CacheResult::offline(cached.items, cached.cached_at))
          }
        }
      }
      Err(SyncError::NotCached { .. }) => {
        debug!(scope, "cache miss");
        let data = fetcher().await?;
        self.install(scope, data)
      }
      Err(e) => Err(e),
    }
  }

  /// Fetch from the network regardless of freshness.
  pub async fn refetch<F, Fut>(
    &self,
    scope: &str,
    fetcher: F,
  ) -> SyncResult<CacheResult<Collection<T>>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, TransportError>>,
  {
    let data = fetcher().await?;
    self.install(scope, data)
  }

  fn install(&self, scope: &str, data: Vec<T>) -> SyncResult<CacheResult<Collection<T>>> {
    self.reconciler.populate(scope, data.clone())?;
    Ok(CacheResult::from_network(Collection::new(data)))
  }
}

impl<T: Cacheable> Clone for CacheLayer<T> {
  fn clone(&self) -> Self {
    Self {
      reconciler: self.reconciler.clone(),
      stale_time: self.stale_time,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::collection::tests::{entry, Entry};
  use crate::cache::traits::CacheSource;
  use std::panic::{catch_unwind, AssertUnwindSafe};

  fn layer() -> CacheLayer<Entry> {
    CacheLayer::new(Arc::new(ItemStore::new()))
  }

  #[tokio::test]
  async fn test_miss_fetches_and_populates() {
    let layer = layer();
    let result = layer
      .fetch_list("alice", || async { Ok(vec![entry("a", 1)]) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert!(layer.reconciler().store().is_cached("alice"));
  }

  #[tokio::test]
  async fn test_fresh_cache_skips_network() {
    let layer = layer();
    layer
      .fetch_list("alice", || async { Ok(vec![entry("a", 1)]) })
      .await
      .unwrap();

    let result = layer
      .fetch_list("alice", || async {
        Err(TransportError::Rejected("should not be called".to_string()))
      })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::CacheFresh);
    assert_eq!(result.data.into_vec(), vec![entry("a", 1)]);
  }

  #[tokio::test]
  async fn test_stale_cache_served_offline_on_failure() {
    let layer = layer().with_stale_time(Duration::seconds(-1));
    layer
      .fetch_list("alice", || async { Ok(vec![entry("a", 1)]) })
      .await
      .unwrap();

    let result = layer
      .fetch_list("alice", || async { Err(TransportError::Timeout) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data.into_vec(), vec![entry("a", 1)]);
  }

  #[tokio::test]
  async fn test_stale_cache_refreshed_on_success() {
    let layer = layer().with_stale_time(Duration::seconds(-1));
    layer
      .fetch_list("alice", || async { Ok(vec![entry("a", 1)]) })
      .await
      .unwrap();

    let result = layer
      .fetch_list("alice", || async { Ok(vec![entry("a", 2), entry("b", 3)]) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(
      layer.reconciler().store().read("alice").unwrap().items.len(),
      2
    );
  }

  #[tokio::test]
  async fn test_miss_with_network_failure_is_error() {
    let layer = layer();
    let err = layer
      .fetch_list("alice", || async { Err(TransportError::Timeout) })
      .await
      .unwrap_err();

    assert!(matches!(err, SyncError::Transport(TransportError::Timeout)));
    assert!(!layer.reconciler().store().is_cached("alice"));
  }

  #[tokio::test]
  async fn test_poisoned_scope_is_not_a_miss() {
    let layer = layer();
    layer
      .fetch_list("alice", || async { Ok(vec![entry("a", 1)]) })
      .await
      .unwrap();

    let store = layer.reconciler().store();
    let _ = catch_unwind(AssertUnwindSafe(|| {
      store.transact("alice", |_cached| -> SyncResult<()> { panic!("writer died") })
    }));

    let err = layer
      .fetch_list("alice", || async {
        Err(TransportError::Rejected("should not be called".to_string()))
      })
      .await
      .unwrap_err();
    assert!(matches!(err, SyncError::LockPoisoned(_)));
  }
}
