//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

/// Trait for entities that can live in a cached collection.
///
/// Implementors provide a stable identity used by the id-based transforms and
/// an optional consistency check run on every reconciliation.
pub trait Cacheable: Clone + Send + Sync + 'static {
  /// Unique identifier for this entity within its collection
  fn cache_key(&self) -> &str;

  /// Entity type name, used in log output (e.g., "recommendation")
  fn entity_type() -> &'static str;

  /// Check entity-local invariants. Returns a description of the violation.
  fn check(&self) -> Result<(), String> {
    Ok(())
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data that is still fresh.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at: Some(cached_at),
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Network unavailable, serving stale cached data
  Offline,
}
