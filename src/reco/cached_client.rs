//! Consumer-facing recommendation client with an optimistic local cache.

use color_eyre::Result;
use std::sync::Arc;

use crate::cache::{CacheLayer, CacheResult, ItemStore};
use crate::config::Config;
use crate::error::{SyncResult, TransportError};

use super::cache::ItemCollection;
use super::client::GraphQlTransport;
use super::coordinator::{MutationCommand, MutationCoordinator, MutationOutcome};
use super::mutation::MutationHandle;
use super::transport::{Operation, Payload, Transport};
use super::types::{NewRecommendation, RecoId, RecommendationItem, UserId};

/// Recommendation client with transparent caching support.
///
/// Reads are served from a per-user cache, fetched on first use. Mutations
/// update that cache immediately where a prediction is possible and return a
/// [`MutationHandle`] that settles once the server has answered. Mutation
/// methods spawn onto the current tokio runtime.
pub struct RecoClient<Tr: Transport = GraphQlTransport> {
  transport: Arc<Tr>,
  cache: CacheLayer<RecommendationItem>,
  coordinator: MutationCoordinator<Tr>,
}

impl RecoClient<GraphQlTransport> {
  /// Create a client talking GraphQL to the configured endpoint.
  pub fn from_config(config: &Config) -> Result<Self> {
    let transport = GraphQlTransport::new(config)?;
    Ok(Self::new(transport).with_stale_time(config.stale_time()))
  }
}

impl<Tr: Transport> RecoClient<Tr> {
  pub fn new(transport: Tr) -> Self {
    let transport = Arc::new(transport);
    let cache = CacheLayer::new(Arc::new(ItemStore::new()));
    let coordinator = MutationCoordinator::new(Arc::clone(&transport), cache.reconciler().clone());

    Self {
      transport,
      cache,
      coordinator,
    }
  }

  /// Set how long a fetched collection is served without refetching.
  pub fn with_stale_time(mut self, stale_time: chrono::Duration) -> Self {
    self.cache = self.cache.with_stale_time(stale_time);
    self
  }

  pub fn coordinator(&self) -> &MutationCoordinator<Tr> {
    &self.coordinator
  }

  async fn fetch_all(&self, user: &UserId) -> Result<Vec<RecommendationItem>, TransportError> {
    let operation = Operation::FetchAll { user: user.clone() };
    match self.transport.execute(operation).await? {
      Payload::Items(items) => Ok(items),
      _ => Err(TransportError::UnexpectedPayload {
        operation: "fetch-all",
      }),
    }
  }

  /// Get every recommendation as `user` sees it, fetching if not cached.
  pub async fn get_items(&self, user: &UserId) -> SyncResult<CacheResult<ItemCollection>> {
    self
      .cache
      .fetch_list(user.as_str(), || self.fetch_all(user))
      .await
  }

  /// Replace `user`'s cached view with a fresh fetch.
  pub async fn refetch(&self, user: &UserId) -> SyncResult<CacheResult<ItemCollection>> {
    self
      .cache
      .refetch(user.as_str(), || self.fetch_all(user))
      .await
  }

  /// Snapshot of the cache, including optimistic writes, without any fetch.
  pub fn cached_items(&self, user: &UserId) -> SyncResult<ItemCollection> {
    Ok(self.cache.reconciler().store().read(user.as_str())?.items)
  }

  /// Drop `user`'s cached view, e.g. at the end of a session.
  pub fn forget(&self, user: &UserId) -> SyncResult<()> {
    self.cache.reconciler().store().evict(user.as_str())
  }

  /// Flip `user`'s vote on `item`. The cache shows the prediction on return.
  pub fn toggle_upvote(
    &self,
    user: &UserId,
    item: &RecommendationItem,
  ) -> SyncResult<MutationHandle<RecommendationItem>> {
    let mutation = self.coordinator.begin_upvote(user, &item.id)?;
    let coordinator = self.coordinator.clone();
    Ok(MutationHandle::spawn(async move {
      coordinator.settle_upvote(mutation).await
    }))
  }

  /// Create a recommendation. The cache changes only after confirmation; the
  /// handle's preview holds a provisional item in the meantime.
  pub fn create_item(
    &self,
    user: &UserId,
    fields: NewRecommendation,
  ) -> SyncResult<MutationHandle<RecommendationItem>> {
    let mutation = self.coordinator.begin_create(user, fields)?;
    let preview = mutation.provisional().clone();
    let coordinator = self.coordinator.clone();
    Ok(
      MutationHandle::spawn(async move { coordinator.settle_create(mutation).await })
        .with_preview(preview),
    )
  }

  /// Delete a recommendation. The cache drops it on return.
  pub fn delete_item(&self, user: &UserId, id: &RecoId) -> SyncResult<MutationHandle<RecoId>> {
    let mutation = self.coordinator.begin_delete(user, id)?;
    let coordinator = self.coordinator.clone();
    Ok(MutationHandle::spawn(async move {
      coordinator.settle_delete(mutation).await
    }))
  }

  /// Run a mutation described by a command.
  pub fn dispatch(&self, command: MutationCommand) -> SyncResult<MutationHandle<MutationOutcome>> {
    let coordinator = self.coordinator.clone();
    let handle = match command {
      MutationCommand::ToggleUpvote { user, item } => {
        let mutation = coordinator.begin_upvote(&user, &item.id)?;
        MutationHandle::spawn(async move {
          coordinator
            .settle_upvote(mutation)
            .await
            .map(MutationOutcome::Upvoted)
        })
      }
      MutationCommand::Create { user, fields } => {
        let mutation = coordinator.begin_create(&user, fields)?;
        let preview = MutationOutcome::Created(mutation.provisional().clone());
        MutationHandle::spawn(async move {
          coordinator
            .settle_create(mutation)
            .await
            .map(MutationOutcome::Created)
        })
        .with_preview(preview)
      }
      MutationCommand::Delete { user, id } => {
        let mutation = coordinator.begin_delete(&user, &id)?;
        MutationHandle::spawn(async move {
          coordinator
            .settle_delete(mutation)
            .await
            .map(MutationOutcome::Deleted)
        })
      }
    };
    Ok(handle)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::error::SyncError;
  use crate::reco::mutation::MutationState;
  use crate::reco::testing::{reco, FakeServer};
  use crate::reco::types::Media;
  use std::time::Duration;

  fn alice() -> UserId {
    UserId::new("alice")
  }

  #[tokio::test]
  async fn test_get_items_reads_through_once() {
    let server = FakeServer::new().with(reco("1", "A", "bob"));
    let client = RecoClient::new(Arc::clone(&server));

    let first = client.get_items(&alice()).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(first.data.len(), 1);

    let second = client.get_items(&alice()).await.unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(server.calls(), 1);
  }

  #[tokio::test]
  async fn test_views_are_per_user() {
    let server = FakeServer::new().with(reco("1", "A", "bob"));
    let client = RecoClient::new(Arc::clone(&server));
    client.get_items(&alice()).await.unwrap();
    client.get_items(&UserId::new("bob")).await.unwrap();

    let item = client.cached_items(&alice()).unwrap().get("1").cloned().unwrap();
    client.toggle_upvote(&alice(), &item).unwrap().wait().await.unwrap();

    let bob_view = client.refetch(&UserId::new("bob")).await.unwrap().data;
    let bob_item = bob_view.get("1").unwrap();
    assert_eq!(bob_item.upvote_count, 1);
    assert!(!bob_item.is_upvoted_by);
    assert!(client.cached_items(&alice()).unwrap().get("1").unwrap().is_upvoted_by);
  }

  #[tokio::test]
  async fn test_toggle_is_visible_before_settlement() {
    let server = FakeServer::new().with(reco("1", "A", "bob"));
    server.vote("1", "bob");
    let client = RecoClient::new(Arc::clone(&server));
    let items = client.get_items(&alice()).await.unwrap().data;

    server.hold();
    let mut handle = client
      .toggle_upvote(&alice(), items.get("1").unwrap())
      .unwrap();

    let optimistic = client.cached_items(&alice()).unwrap();
    assert_eq!(optimistic.get("1").unwrap().upvote_count, 2);
    assert!(handle.is_pending());
    assert!(!handle.poll());

    server.release();
    let confirmed = handle.wait().await.unwrap();
    assert_eq!(confirmed.upvote_count, 2);
  }

  #[tokio::test]
  async fn test_delete_failure_restores_and_reports_once() {
    let server = FakeServer::new()
      .with(reco("3", "A", "alice"))
      .with(reco("7", "B", "alice"))
      .with(reco("8", "C", "alice"));
    let client = RecoClient::new(Arc::clone(&server));
    let before = client.get_items(&alice()).await.unwrap().data;

    server.hold();
    server.fail_next(1);
    let mut handle = client.delete_item(&alice(), &RecoId::new("7")).unwrap();

    let during = client.cached_items(&alice()).unwrap();
    assert_eq!(during.len(), 2);
    assert!(!during.contains("7"));

    server.release();
    while !handle.poll() {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(matches!(handle.state(), MutationState::Failed(e) if e.is_transport()));
    assert!(!handle.poll());
    assert_eq!(client.cached_items(&alice()).unwrap(), before);
  }

  #[tokio::test]
  async fn test_create_preview_then_append() {
    let server = FakeServer::new().with(reco("1", "A", "bob"));
    server.sign_in("alice");
    let client = RecoClient::new(Arc::clone(&server));
    client.get_items(&alice()).await.unwrap();

    let handle = client
      .create_item(
        &alice(),
        NewRecommendation {
          name: "Mushishi".to_string(),
          link: None,
          media: Media::Anime,
        },
      )
      .unwrap();

    let preview = handle.preview().cloned().unwrap();
    assert!(preview.id.is_placeholder());
    assert_eq!(preview.name, "Mushishi");

    let created = handle.wait().await.unwrap();
    let items = client.cached_items(&alice()).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items.as_slice()[1], created);
    assert_eq!(created.name, preview.name);
    assert!(!created.id.is_placeholder());
  }

  #[tokio::test]
  async fn test_created_item_matches_server_after_refetch() {
    let server = FakeServer::new().with(reco("1", "A", "bob"));
    server.sign_in("alice");
    let client = RecoClient::new(Arc::clone(&server));
    client.get_items(&alice()).await.unwrap();

    let fields = NewRecommendation {
      name: "Mushishi".to_string(),
      link: Some("https://example.org/mushishi".to_string()),
      media: Media::Anime,
    };
    client.create_item(&alice(), fields).unwrap().wait().await.unwrap();
    let merged = client.cached_items(&alice()).unwrap();

    let refetched = client.refetch(&alice()).await.unwrap().data;
    assert_eq!(refetched, merged);
  }

  #[tokio::test]
  async fn test_mutation_before_fetch_fails_fast() {
    let server = FakeServer::new().with(reco("1", "A", "bob"));
    let client = RecoClient::new(Arc::clone(&server));

    let err = client
      .delete_item(&alice(), &RecoId::new("1"))
      .unwrap_err();
    assert!(matches!(err, SyncError::NotCached { .. }));
    assert_eq!(server.calls(), 0);
  }

  #[tokio::test]
  async fn test_dispatch_commands() {
    let server = FakeServer::new()
      .with(reco("1", "A", "bob"))
      .with(reco("2", "B", "alice"));
    server.sign_in("alice");
    let client = RecoClient::new(Arc::clone(&server));
    let items = client.get_items(&alice()).await.unwrap().data;

    let upvoted = client
      .dispatch(MutationCommand::ToggleUpvote {
        user: alice(),
        item: items.get("1").cloned().unwrap(),
      })
      .unwrap()
      .wait()
      .await
      .unwrap();
    assert!(matches!(upvoted, MutationOutcome::Upvoted(ref i) if i.is_upvoted_by));

    let deleted = client
      .dispatch(MutationCommand::Delete {
        user: alice(),
        id: RecoId::new("2"),
      })
      .unwrap()
      .wait()
      .await
      .unwrap();
    assert_eq!(deleted, MutationOutcome::Deleted(RecoId::new("2")));

    let created = client
      .dispatch(MutationCommand::Create {
        user: alice(),
        fields: NewRecommendation {
          name: "C".to_string(),
          link: None,
          media: Media::Other,
        },
      })
      .unwrap();
    assert!(matches!(created.preview(), Some(MutationOutcome::Created(_))));
    created.wait().await.unwrap();

    let names: Vec<_> = client
      .cached_items(&alice())
      .unwrap()
      .iter()
      .map(|i| i.name.clone())
      .collect();
    assert_eq!(names, vec!["A", "C"]);
  }

  #[tokio::test]
  async fn test_concurrent_toggles_on_different_items_both_land() {
    let server = FakeServer::new()
      .with(reco("1", "A", "bob"))
      .with(reco("2", "B", "bob"));
    let client = RecoClient::new(Arc::clone(&server));
    let items = client.get_items(&alice()).await.unwrap().data;

    let first = client.toggle_upvote(&alice(), items.get("1").unwrap()).unwrap();
    let second = client.toggle_upvote(&alice(), items.get("2").unwrap()).unwrap();
    first.wait().await.unwrap();
    second.wait().await.unwrap();

    let cached = client.cached_items(&alice()).unwrap();
    assert!(cached.iter().all(|i| i.is_upvoted_by && i.upvote_count == 1));
  }

  #[tokio::test]
  async fn test_forget_drops_cache() {
    let server = FakeServer::new().with(reco("1", "A", "bob"));
    let client = RecoClient::new(Arc::clone(&server));
    client.get_items(&alice()).await.unwrap();
    client.forget(&alice()).unwrap();
    assert!(matches!(
      client.cached_items(&alice()),
      Err(SyncError::NotCached { .. })
    ));
  }
}
