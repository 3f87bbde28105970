//! Predicted post-mutation state, computed before the server answers.
//!
//! Every function here is pure. Predictions assume the mutation succeeds and
//! that nobody else voted meanwhile; reconciliation with the server's answer
//! corrects any drift.

use crate::cache::Transform;
use crate::error::{SyncError, SyncResult};

use super::types::{NewRecommendation, RecoId, RecommendationItem, UserId};

/// Predict the item after the viewer flips their vote.
///
/// The flag is negated and the count moves by exactly one in the same
/// direction. An item claiming the viewer's vote with a zero count cannot be
/// un-voted without going negative and is rejected.
pub fn project_upvote(item: &RecommendationItem) -> SyncResult<RecommendationItem> {
  let is_upvoted_by = !item.is_upvoted_by;
  let upvote_count = if is_upvoted_by {
    item.upvote_count.checked_add(1)
  } else {
    item.upvote_count.checked_sub(1)
  }
  .ok_or_else(|| {
    SyncError::InvariantViolation(format!(
      "toggling upvote on `{}` would move its count out of range",
      item.id
    ))
  })?;

  Ok(RecommendationItem {
    upvote_count,
    is_upvoted_by,
    ..item.clone()
  })
}

/// Provisional item for a create that has not been confirmed yet.
///
/// Carries a placeholder id, so it must never be written to the cache.
pub fn project_create(fields: &NewRecommendation, user: &UserId) -> RecommendationItem {
  RecommendationItem {
    id: RecoId::placeholder(),
    name: fields.name.clone(),
    link: fields.link.clone(),
    media: fields.media,
    created_by: user.clone(),
    upvote_count: 0,
    is_upvoted_by: false,
  }
}

/// A delete predicts no item, only that the id will be absent.
pub fn project_delete(id: &RecoId) -> Transform<RecommendationItem> {
  Transform::RemoveById(id.as_str().to_string())
}
