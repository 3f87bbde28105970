//! Generic client-side cache for collections of server entities.
//!
//! This module is domain-agnostic. It provides:
//! - An in-memory store partitioned by scope (usually the viewing user)
//! - A reconciler that applies pure transforms as one locked read-transform-write unit
//! - A read-through layer with staleness tracking and an offline fallback

mod collection;
mod layer;
mod reconcile;
mod store;
mod traits;

pub use collection::Collection;
pub use layer::CacheLayer;
pub use reconcile::{Reconciler, Transform};
pub use store::{CachedCollection, ItemStore};
pub use traits::{CacheResult, CacheSource, Cacheable};
