//! Serde types matching the recommendation service's GraphQL API.
//!
//! These types are separate from domain types so each operation only has to
//! decode the fields it actually selects.

use serde::{Deserialize, Serialize};

use super::types::{Media, NewRecommendation, RecoId, RecommendationItem, UserId};

// ============================================================================
// Documents
// ============================================================================

pub const GET_RECOMMANDATIONS: &str = r#"
query ($userId: ID!) {
  recommandations {
    id
    name
    link
    media
    upvoteCount
    createdBy
    isUpvotedBy(userId: $userId)
  }
}
"#;

pub const FLIP_UPVOTE: &str = r#"
mutation ($userId: ID!, $recoId: ID!) {
  flipRecommandationVote(userId: $userId, recoId: $recoId) {
    id
    upvoteCount
    isUpvotedBy(userId: $userId)
  }
}
"#;

pub const CREATE_NEW_RECO: &str = r#"
mutation ($new: NewRecommandation!) {
  createRecommandation(new: $new) {
    id
    name
    link
    media
  }
}
"#;

pub const DELETE_RECO: &str = r#"
mutation ($recoId: ID!) {
  deleteRecommandation(recoId: $recoId) {
    id
  }
}
"#;

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V> {
  pub query: &'a str,
  pub variables: V,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<D> {
  pub data: Option<D>,
  #[serde(default)]
  pub errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlErrorMessage {
  pub message: String,
}

// ============================================================================
// Variables
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVariables<'a> {
  pub user_id: &'a UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlipVoteVariables<'a> {
  pub user_id: &'a UserId,
  pub reco_id: &'a RecoId,
}

#[derive(Debug, Serialize)]
pub struct CreateVariables<'a> {
  pub new: &'a NewRecommendation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVariables<'a> {
  pub reco_id: &'a RecoId,
}

// ============================================================================
// Response data
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RecommandationsData {
  pub recommandations: Vec<RecommendationItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlipVoteData {
  pub flip_recommandation_vote: VotePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateData {
  pub create_recommandation: CreatedPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteData {
  pub delete_recommandation: DeletedPayload,
}

// ============================================================================
// Mutation payloads
// ============================================================================

/// Vote fields returned after a toggle. Other fields stay as cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotePayload {
  pub id: RecoId,
  pub upvote_count: u32,
  pub is_upvoted_by: bool,
}

impl VotePayload {
  /// Overlay the authoritative vote fields onto a cached item.
  pub fn apply_to(&self, item: &RecommendationItem) -> RecommendationItem {
    RecommendationItem {
      upvote_count: self.upvote_count,
      is_upvoted_by: self.is_upvoted_by,
      ..item.clone()
    }
  }
}

/// Authored fields of a created recommendation with its assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPayload {
  pub id: RecoId,
  pub name: String,
  pub link: Option<String>,
  pub media: Media,
}

impl CreatedPayload {
  /// Merge with the local defaults for a brand new recommendation.
  pub fn into_item(self, created_by: UserId) -> RecommendationItem {
    RecommendationItem {
      id: self.id,
      name: self.name,
      link: self.link,
      media: self.media,
      created_by,
      upvote_count: 0,
      is_upvoted_by: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedPayload {
  pub id: RecoId,
}
