//! Orchestrates toggle-upvote, create and delete end to end.
//!
//! Each mutation instance is an explicit state machine. Cache writes happen
//! only through the [`Reconciler`], and a mutation never suspends while
//! holding the cache: the only await point is the transport round-trip.
//!
//! ```text
//! upvote: Idle -> OptimisticApplied -> Confirmed | Reverted
//! create: Idle -> Pending           -> Confirmed | Failed
//! delete: Idle -> OptimisticRemoved -> Confirmed | Restored
//! ```
//!
//! Mutations on the same id are not serialized against each other. Whichever
//! reconciliation runs last wins; e.g. a toggle confirmed after a delete
//! leaves the item deleted, and a toggle started after an optimistic delete
//! fails with `UnknownItem`.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache::{Reconciler, Transform};
use crate::error::{SyncError, SyncResult, TransportError};

use super::api_types::{CreatedPayload, VotePayload};
use super::projector::{project_create, project_delete, project_upvote};
use super::transport::{Operation, Payload, Transport};
use super::types::{NewRecommendation, RecoId, RecommendationItem, UserId};

/// A mutation intent, decoupled from whatever triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationCommand {
  ToggleUpvote {
    user: UserId,
    item: RecommendationItem,
  },
  Create {
    user: UserId,
    fields: NewRecommendation,
  },
  Delete {
    user: UserId,
    id: RecoId,
  },
}

/// What a settled command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
  Upvoted(RecommendationItem),
  Created(RecommendationItem),
  Deleted(RecoId),
}

fn illegal(kind: &str, phase: impl std::fmt::Debug, action: &str) -> SyncError {
  SyncError::InvariantViolation(format!("cannot {action} {kind} mutation in phase {phase:?}"))
}

// ============================================================================
// Upvote toggle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpvotePhase {
  Idle,
  OptimisticApplied,
  Confirmed,
  Reverted,
}

#[derive(Debug)]
enum UpvoteState {
  Idle,
  Applied { previous: RecommendationItem },
  Confirmed,
  Reverted,
}

/// One toggle-upvote in flight.
#[derive(Debug)]
pub struct UpvoteMutation {
  user: UserId,
  id: RecoId,
  state: UpvoteState,
}

impl UpvoteMutation {
  pub fn new(user: UserId, id: RecoId) -> Self {
    Self {
      user,
      id,
      state: UpvoteState::Idle,
    }
  }

  pub fn phase(&self) -> UpvotePhase {
    match self.state {
      UpvoteState::Idle => UpvotePhase::Idle,
      UpvoteState::Applied { .. } => UpvotePhase::OptimisticApplied,
      UpvoteState::Confirmed => UpvotePhase::Confirmed,
      UpvoteState::Reverted => UpvotePhase::Reverted,
    }
  }

  /// Write the predicted item, remembering the one it replaced.
  pub fn apply(
    &mut self,
    reconciler: &Reconciler<RecommendationItem>,
  ) -> SyncResult<RecommendationItem> {
    if !matches!(self.state, UpvoteState::Idle) {
      return Err(illegal("upvote", self.phase(), "apply"));
    }

    let scope = self.user.as_str();
    let id = self.id.as_str();
    let (previous, projected) = reconciler.reconcile_with(scope, |items| {
      let current = items.get(id).cloned().ok_or_else(|| SyncError::UnknownItem {
        scope: scope.to_string(),
        id: id.to_string(),
      })?;
      let projected = project_upvote(&current)?;
      Ok((Transform::ReplaceById(projected.clone()), (current, projected)))
    })?;

    debug!(
      user = %self.user,
      id = %self.id,
      upvote_count = projected.upvote_count,
      "optimistic upvote applied"
    );
    self.state = UpvoteState::Applied { previous };
    Ok(projected)
  }

  /// Overlay the server's vote fields on the cached item.
  pub fn confirm(
    &mut self,
    reconciler: &Reconciler<RecommendationItem>,
    payload: &VotePayload,
  ) -> SyncResult<RecommendationItem> {
    let UpvoteState::Applied { previous } = &self.state else {
      return Err(illegal("upvote", self.phase(), "confirm"));
    };

    let id = self.id.as_str();
    let confirmed = reconciler.reconcile_with(self.user.as_str(), |items| {
      // A concurrent delete may have removed it; the replace is then a no-op.
      let base = items.get(id).unwrap_or(previous);
      let confirmed = payload.apply_to(base);
      Ok((Transform::ReplaceById(confirmed.clone()), confirmed))
    })?;

    self.state = UpvoteState::Confirmed;
    Ok(confirmed)
  }

  /// Put back the exact item seen before the optimistic write.
  pub fn revert(&mut self, reconciler: &Reconciler<RecommendationItem>) -> SyncResult<()> {
    let UpvoteState::Applied { previous } = &self.state else {
      return Err(illegal("upvote", self.phase(), "revert"));
    };

    reconciler.reconcile(self.user.as_str(), Transform::ReplaceById(previous.clone()))?;
    self.state = UpvoteState::Reverted;
    Ok(())
  }
}

// ============================================================================
// Create
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePhase {
  Idle,
  Pending,
  Confirmed,
  Failed,
}

#[derive(Debug)]
pub struct CreateMutation {
  user: UserId,
  fields: NewRecommendation,
  provisional: RecommendationItem,
  phase: CreatePhase,
}

impl CreateMutation {
  pub fn new(user: UserId, fields: NewRecommendation) -> Self {
    let provisional = project_create(&fields, &user);
    Self {
      user,
      fields,
      provisional,
      phase: CreatePhase::Idle,
    }
  }

  pub fn phase(&self) -> CreatePhase {
    self.phase
  }

  /// Predicted item with a placeholder id. Never written to the cache.
  pub fn provisional(&self) -> &RecommendationItem {
    &self.provisional
  }

  /// Mark submitted. The cache is left alone until the real id is known.
  pub fn submit(&mut self, reconciler: &Reconciler<RecommendationItem>) -> SyncResult<()> {
    if self.phase != CreatePhase::Idle {
      return Err(illegal("create", self.phase, "submit"));
    }
    // Refuse before the server creates something we could never show.
    reconciler.store().read(self.user.as_str())?;
    self.phase = CreatePhase::Pending;
    Ok(())
  }

  /// Append the server's item merged with local vote defaults.
  pub fn confirm(
    &mut self,
    reconciler: &Reconciler<RecommendationItem>,
    payload: CreatedPayload,
  ) -> SyncResult<RecommendationItem> {
    if self.phase != CreatePhase::Pending {
      return Err(illegal("create", self.phase, "confirm"));
    }

    let item = payload.into_item(self.user.clone());
    reconciler.reconcile(self.user.as_str(), Transform::Append(item.clone()))?;
    self.phase = CreatePhase::Confirmed;
    Ok(item)
  }

  pub fn fail(&mut self) -> SyncResult<()> {
    if self.phase != CreatePhase::Pending {
      return Err(illegal("create", self.phase, "fail"));
    }
    self.phase = CreatePhase::Failed;
    Ok(())
  }
}

// ============================================================================
// Delete
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePhase {
  Idle,
  OptimisticRemoved,
  Confirmed,
  Restored,
}

#[derive(Debug)]
enum DeleteState {
  Idle,
  Removed { index: usize, item: RecommendationItem },
  Confirmed,
  Restored,
}

#[derive(Debug)]
pub struct DeleteMutation {
  user: UserId,
  id: RecoId,
  state: DeleteState,
}

impl DeleteMutation {
  pub fn new(user: UserId, id: RecoId) -> Self {
    Self {
      user,
      id,
      state: DeleteState::Idle,
    }
  }

  pub fn phase(&self) -> DeletePhase {
    match self.state {
      DeleteState::Idle => DeletePhase::Idle,
      DeleteState::Removed { .. } => DeletePhase::OptimisticRemoved,
      DeleteState::Confirmed => DeletePhase::Confirmed,
      DeleteState::Restored => DeletePhase::Restored,
    }
  }

  /// Remove the item now, keeping it and its index for a restore.
  pub fn apply(&mut self, reconciler: &Reconciler<RecommendationItem>) -> SyncResult<()> {
    if !matches!(self.state, DeleteState::Idle) {
      return Err(illegal("delete", self.phase(), "apply"));
    }

    let scope = self.user.as_str();
    let id = &self.id;
    let (index, item) = reconciler.reconcile_with(scope, |items| {
      let unknown = || SyncError::UnknownItem {
        scope: scope.to_string(),
        id: id.to_string(),
      };
      let index = items.position(id.as_str()).ok_or_else(unknown)?;
      let item = items.get(id.as_str()).cloned().ok_or_else(unknown)?;
      Ok((project_delete(id), (index, item)))
    })?;

    debug!(user = %self.user, id = %self.id, index, "optimistic delete applied");
    self.state = DeleteState::Removed { index, item };
    Ok(())
  }

  /// The cache already reflects the absence.
  pub fn confirm(&mut self) -> SyncResult<()> {
    if !matches!(self.state, DeleteState::Removed { .. }) {
      return Err(illegal("delete", self.phase(), "confirm"));
    }
    self.state = DeleteState::Confirmed;
    Ok(())
  }

  /// Re-insert the retained copy at its original index.
  pub fn restore(&mut self, reconciler: &Reconciler<RecommendationItem>) -> SyncResult<()> {
    let DeleteState::Removed { index, item } = &self.state else {
      return Err(illegal("delete", self.phase(), "restore"));
    };

    reconciler.reconcile(
      self.user.as_str(),
      Transform::InsertAt {
        index: *index,
        item: item.clone(),
      },
    )?;
    self.state = DeleteState::Restored;
    Ok(())
  }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Runs mutations against a transport and keeps the cache consistent.
pub struct MutationCoordinator<Tr: Transport> {
  transport: Arc<Tr>,
  reconciler: Reconciler<RecommendationItem>,
}

impl<Tr: Transport> Clone for MutationCoordinator<Tr> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      reconciler: self.reconciler.clone(),
    }
  }
}

impl<Tr: Transport> MutationCoordinator<Tr> {
  pub fn new(transport: Arc<Tr>, reconciler: Reconciler<RecommendationItem>) -> Self {
    Self {
      transport,
      reconciler,
    }
  }

  pub fn reconciler(&self) -> &Reconciler<RecommendationItem> {
    &self.reconciler
  }

  // --------------------------------------------------------------------------
  // Upvote
  // --------------------------------------------------------------------------

  /// Apply the optimistic toggle. Nothing is submitted yet.
  pub fn begin_upvote(&self, user: &UserId, id: &RecoId) -> SyncResult<UpvoteMutation> {
    let mut mutation = UpvoteMutation::new(user.clone(), id.clone());
    mutation.apply(&self.reconciler)?;
    Ok(mutation)
  }

  /// Submit the toggle and reconcile the server's answer, or revert.
  pub async fn settle_upvote(
    &self,
    mut mutation: UpvoteMutation,
  ) -> SyncResult<RecommendationItem> {
    let operation = Operation::ToggleUpvote {
      user: mutation.user.clone(),
      id: mutation.id.clone(),
    };

    let submitted = match self.transport.execute(operation).await {
      Ok(Payload::Vote(payload)) if payload.id == mutation.id => Ok(payload),
      Ok(_) => Err(TransportError::UnexpectedPayload {
        operation: "toggle-upvote",
      }),
      Err(e) => Err(e),
    };

    let failure: SyncError = match submitted {
      Ok(payload) => match mutation.confirm(&self.reconciler, &payload) {
        Ok(confirmed) => {
          info!(
            user = %mutation.user,
            id = %mutation.id,
            upvote_count = confirmed.upvote_count,
            "upvote confirmed"
          );
          return Ok(confirmed);
        }
        Err(e) => e,
      },
      Err(e) => e.into(),
    };

    warn!(user = %mutation.user, id = %mutation.id, error = %failure, "upvote failed, reverting");
    if let Err(revert_err) = mutation.revert(&self.reconciler) {
      error!(id = %mutation.id, error = %revert_err, "failed to revert upvote");
    }
    Err(failure)
  }

  pub async fn toggle_upvote(&self, user: &UserId, id: &RecoId) -> SyncResult<RecommendationItem> {
    let mutation = self.begin_upvote(user, id)?;
    self.settle_upvote(mutation).await
  }

  // --------------------------------------------------------------------------
  // Create
  // --------------------------------------------------------------------------

  pub fn begin_create(
    &self,
    user: &UserId,
    fields: NewRecommendation,
  ) -> SyncResult<CreateMutation> {
    let mut mutation = CreateMutation::new(user.clone(), fields);
    mutation.submit(&self.reconciler)?;
    Ok(mutation)
  }

  /// Submit the create; append the result on success, change nothing on failure.
  pub async fn settle_create(
    &self,
    mut mutation: CreateMutation,
  ) -> SyncResult<RecommendationItem> {
    let operation = Operation::Create {
      fields: mutation.fields.clone(),
    };

    let submitted = match self.transport.execute(operation).await {
      Ok(Payload::Created(payload)) => Ok(payload),
      Ok(_) => Err(TransportError::UnexpectedPayload {
        operation: "create",
      }),
      Err(e) => Err(e),
    };

    match submitted {
      Ok(payload) => match mutation.confirm(&self.reconciler, payload) {
        Ok(item) => {
          info!(user = %mutation.user, id = %item.id, "recommendation created");
          Ok(item)
        }
        Err(e) => {
          error!(user = %mutation.user, error = %e, "created item could not be cached");
          mutation.fail()?;
          Err(e)
        }
      },
      Err(e) => {
        warn!(user = %mutation.user, name = %mutation.fields.name, error = %e, "create failed");
        mutation.fail()?;
        Err(e.into())
      }
    }
  }

  pub async fn create(
    &self,
    user: &UserId,
    fields: NewRecommendation,
  ) -> SyncResult<RecommendationItem> {
    let mutation = self.begin_create(user, fields)?;
    self.settle_create(mutation).await
  }

  // --------------------------------------------------------------------------
  // Delete
  // --------------------------------------------------------------------------

  pub fn begin_delete(&self, user: &UserId, id: &RecoId) -> SyncResult<DeleteMutation> {
    let mut mutation = DeleteMutation::new(user.clone(), id.clone());
    mutation.apply(&self.reconciler)?;
    Ok(mutation)
  }

  /// Submit the delete; restore the item at its old index on failure.
  pub async fn settle_delete(&self, mut mutation: DeleteMutation) -> SyncResult<RecoId> {
    let operation = Operation::Delete {
      id: mutation.id.clone(),
    };

    let submitted = match self.transport.execute(operation).await {
      Ok(Payload::Deleted(payload)) if payload.id == mutation.id => Ok(payload),
      Ok(_) => Err(TransportError::UnexpectedPayload {
        operation: "delete",
      }),
      Err(e) => Err(e),
    };

    match submitted {
      Ok(payload) => {
        mutation.confirm()?;
        info!(user = %mutation.user, id = %payload.id, "recommendation deleted");
        Ok(payload.id)
      }
      Err(e) => {
        warn!(user = %mutation.user, id = %mutation.id, error = %e, "delete failed, restoring");
        if let Err(restore_err) = mutation.restore(&self.reconciler) {
          error!(id = %mutation.id, error = %restore_err, "failed to restore deleted item");
        }
        Err(e.into())
      }
    }
  }

  pub async fn delete(&self, user: &UserId, id: &RecoId) -> SyncResult<RecoId> {
    let mutation = self.begin_delete(user, id)?;
    self.settle_delete(mutation).await
  }
}
