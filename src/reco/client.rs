use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::TransportError;
use crate::reco::api_types::{
  CreateData, CreateVariables, CreatedPayload, DeleteData, DeleteVariables, DeletedPayload,
  FlipVoteData, FlipVoteVariables, GraphQlRequest, GraphQlResponse, RecommandationsData,
  UserVariables, VotePayload, CREATE_NEW_RECO, DELETE_RECO, FLIP_UPVOTE, GET_RECOMMANDATIONS,
};
use crate::reco::transport::{Operation, Payload, Transport};
use crate::reco::types::{NewRecommendation, RecoId, RecommendationItem, UserId};

/// GraphQL-over-HTTP client for the recommendation service
#[derive(Clone)]
pub struct GraphQlTransport {
  http: reqwest::Client,
  endpoint: Url,
}

impl GraphQlTransport {
  pub fn new(config: &Config) -> Result<Self> {
    Self::with_endpoint(config.endpoint_url()?, config.request_timeout())
  }

  pub fn with_endpoint(endpoint: Url, timeout: Duration) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, endpoint })
  }

  /// Post one GraphQL document and decode its `data` member
  async fn post<V: Serialize, D: DeserializeOwned>(
    &self,
    query: &str,
    variables: V,
  ) -> Result<D, TransportError> {
    let response = self
      .http
      .post(self.endpoint.clone())
      .json(&GraphQlRequest { query, variables })
      .send()
      .await
      .map_err(classify)?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(classify)?;

    if !status.is_success() {
      // Servers often explain a 4xx in the usual errors array.
      return match serde_json::from_slice::<GraphQlResponse<serde_json::Value>>(&bytes) {
        Ok(body) if !body.errors.is_empty() => Err(TransportError::GraphQl(
          body.errors.into_iter().map(|e| e.message).collect(),
        )),
        _ => Err(TransportError::Status(status)),
      };
    }

    let body: GraphQlResponse<D> = serde_json::from_slice(&bytes)?;
    if !body.errors.is_empty() {
      return Err(TransportError::GraphQl(
        body.errors.into_iter().map(|e| e.message).collect(),
      ));
    }

    body
      .data
      .ok_or_else(|| TransportError::GraphQl(vec!["response carried no data".to_string()]))
  }

  /// Get every recommendation as seen by `user`
  pub async fn fetch_all(&self, user: &UserId) -> Result<Vec<RecommendationItem>, TransportError> {
    let data: RecommandationsData = self
      .post(GET_RECOMMANDATIONS, UserVariables { user_id: user })
      .await?;
    Ok(data.recommandations)
  }

  /// Flip `user`'s vote on a recommendation
  pub async fn flip_upvote(
    &self,
    user: &UserId,
    id: &RecoId,
  ) -> Result<VotePayload, TransportError> {
    let data: FlipVoteData = self
      .post(
        FLIP_UPVOTE,
        FlipVoteVariables {
          user_id: user,
          reco_id: id,
        },
      )
      .await?;
    Ok(data.flip_recommandation_vote)
  }

  pub async fn create(&self, fields: &NewRecommendation) -> Result<CreatedPayload, TransportError> {
    let data: CreateData = self
      .post(CREATE_NEW_RECO, CreateVariables { new: fields })
      .await?;
    Ok(data.create_recommandation)
  }

  pub async fn delete(&self, id: &RecoId) -> Result<DeletedPayload, TransportError> {
    let data: DeleteData = self.post(DELETE_RECO, DeleteVariables { reco_id: id }).await?;
    Ok(data.delete_recommandation)
  }
}

impl Transport for GraphQlTransport {
  fn execute(&self, operation: Operation) -> BoxFuture<'_, Result<Payload, TransportError>> {
    Box::pin(async move {
      debug!(operation = operation.name(), endpoint = %self.endpoint, "executing");
      match operation {
        Operation::FetchAll { user } => self.fetch_all(&user).await.map(Payload::Items),
        Operation::ToggleUpvote { user, id } => {
          self.flip_upvote(&user, &id).await.map(Payload::Vote)
        }
        Operation::Create { fields } => self.create(&fields).await.map(Payload::Created),
        Operation::Delete { id } => self.delete(&id).await.map(Payload::Deleted),
      }
    })
  }
}

fn classify(e: reqwest::Error) -> TransportError {
  if e.is_timeout() {
    TransportError::Timeout
  } else {
    TransportError::Http(e)
  }
}
