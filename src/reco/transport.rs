//! Boundary to the external query/mutation execution facility.

use futures::future::BoxFuture;
use std::sync::Arc;

use super::api_types::{CreatedPayload, DeletedPayload, VotePayload};
use super::types::{NewRecommendation, RecoId, RecommendationItem, UserId};
use crate::error::TransportError;

/// An operation the remote service can execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  FetchAll { user: UserId },
  ToggleUpvote { user: UserId, id: RecoId },
  Create { fields: NewRecommendation },
  Delete { id: RecoId },
}

impl Operation {
  pub fn name(&self) -> &'static str {
    match self {
      Operation::FetchAll { .. } => "fetch-all",
      Operation::ToggleUpvote { .. } => "toggle-upvote",
      Operation::Create { .. } => "create",
      Operation::Delete { .. } => "delete",
    }
  }
}

/// What the remote service answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
  Items(Vec<RecommendationItem>),
  Vote(VotePayload),
  Created(CreatedPayload),
  Deleted(DeletedPayload),
}

/// Executes operations against the remote service.
///
/// Timeouts, retries and authentication are the implementor's business; any
/// failure, including a timeout, is simply an `Err`.
pub trait Transport: Send + Sync + 'static {
  fn execute(&self, operation: Operation) -> BoxFuture<'_, Result<Payload, TransportError>>;
}

impl<T: Transport> Transport for Arc<T> {
  fn execute(&self, operation: Operation) -> BoxFuture<'_, Result<Payload, TransportError>> {
    (**self).execute(operation)
  }
}
