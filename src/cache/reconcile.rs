//! Read-transform-write reconciliation over the item store.

use std::sync::Arc;
use tracing::{debug, error};

use super::collection::Collection;
use super::store::ItemStore;
use super::traits::Cacheable;
use crate::error::{SyncError, SyncResult};

/// A pure transformation of a cached collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform<T> {
  /// Add an entity at the end. An entity whose key is already present is
  /// replaced in place instead, so the key stays unique.
  Append(T),
  /// Drop the entity with this key, if present.
  RemoveById(String),
  /// Swap the entity with a matching key; no-op when the key is absent.
  ReplaceById(T),
  /// Put an entity back at a former index (clamped to the current length).
  /// Replaces in place if the key has reappeared meanwhile.
  InsertAt { index: usize, item: T },
  /// Swap the whole collection, as after a full fetch.
  ReplaceAll(Collection<T>),
}

impl<T: Cacheable> Transform<T> {
  /// Apply the transform, producing the next collection.
  pub fn apply(self, mut items: Collection<T>) -> Collection<T> {
    match self {
      Transform::Append(item) => {
        if items.replace(item.clone()).is_none() {
          items.push(item);
        }
      }
      Transform::RemoveById(key) => {
        items.remove(&key);
      }
      Transform::ReplaceById(item) => {
        items.replace(item);
      }
      Transform::InsertAt { index, item } => {
        if items.replace(item.clone()).is_none() {
          items.insert_at(index, item);
        }
      }
      Transform::ReplaceAll(next) => items = next,
    }
    items
  }

  fn name(&self) -> &'static str {
    match self {
      Transform::Append(_) => "append",
      Transform::RemoveById(_) => "remove_by_id",
      Transform::ReplaceById(_) => "replace_by_id",
      Transform::InsertAt { .. } => "insert_at",
      Transform::ReplaceAll(_) => "replace_all",
    }
  }
}

/// Sole writer of the item store.
///
/// Every reconciliation holds the scope's lock from read to write, so two
/// reconciliations for the same user can never interleave and drop an update.
pub struct Reconciler<T: Cacheable> {
  store: Arc<ItemStore<T>>,
}

impl<T: Cacheable> Clone for Reconciler<T> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<T: Cacheable> Reconciler<T> {
  pub fn new(store: Arc<ItemStore<T>>) -> Self {
    Self { store }
  }

  /// The store this reconciler writes to, for read access.
  pub fn store(&self) -> &ItemStore<T> {
    &self.store
  }

  /// Apply a fixed transform to the scope's collection.
  pub fn reconcile(&self, scope: &str, transform: Transform<T>) -> SyncResult<()> {
    self.reconcile_with(scope, |_| Ok((transform, ())))
  }

  /// Read the scope's collection, let `plan` choose a transform from it, apply
  /// and write back, all as one unit.
  ///
  /// `plan` may also return a value derived from the state it saw (e.g. the
  /// entity about to be overwritten). Nothing is written if `plan` fails or
  /// the result violates a collection invariant.
  pub fn reconcile_with<R>(
    &self,
    scope: &str,
    plan: impl FnOnce(&Collection<T>) -> SyncResult<(Transform<T>, R)>,
  ) -> SyncResult<R> {
    self.store.transact(scope, |cached| {
      let (transform, output) = plan(&cached.items)?;
      cached.items = Self::checked(scope, transform, cached.items.clone())?;
      Ok(output)
    })
  }

  /// Install a freshly fetched collection, populating the scope if needed.
  pub fn populate(&self, scope: &str, items: Vec<T>) -> SyncResult<()> {
    debug!(scope, len = items.len(), entity = T::entity_type(), "populating cache");
    let next = Self::checked(
      scope,
      Transform::ReplaceAll(Collection::new(items)),
      Collection::default(),
    )?;
    self.store.write(scope, next)
  }

  fn checked(
    scope: &str,
    transform: Transform<T>,
    items: Collection<T>,
  ) -> SyncResult<Collection<T>> {
    let name = transform.name();
    let next = transform.apply(items);

    if let Err(violation) = next.validate() {
      error!(scope, transform = name, %violation, "refusing to write inconsistent collection");
      return Err(SyncError::InvariantViolation(violation));
    }

    debug!(scope, transform = name, len = next.len(), "reconciled");
    Ok(next)
  }
}
