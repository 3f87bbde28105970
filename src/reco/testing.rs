//! Scripted in-process stand-in for the recommendation service.

use futures::future::BoxFuture;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use super::api_types::{CreatedPayload, DeletedPayload, VotePayload};
use super::transport::{Operation, Payload, Transport};
use super::types::{Media, RecoId, RecommendationItem, UserId};
use crate::error::TransportError;

/// A recommendation as the server stores it, without per-viewer fields.
#[derive(Debug, Clone)]
pub struct StoredReco {
  pub id: RecoId,
  pub name: String,
  pub link: Option<String>,
  pub media: Media,
  pub created_by: UserId,
}

pub fn reco(id: &str, name: &str, created_by: &str) -> StoredReco {
  StoredReco {
    id: RecoId::new(id),
    name: name.to_string(),
    link: None,
    media: Media::Manga,
    created_by: UserId::new(created_by),
  }
}

#[derive(Default)]
struct ServerState {
  recos: Vec<StoredReco>,
  votes: HashMap<RecoId, BTreeSet<UserId>>,
  next_id: u64,
  session: Option<UserId>,
  fail_next: usize,
  scripted: VecDeque<Payload>,
}

impl ServerState {
  fn view(&self, reco: &StoredReco, user: &UserId) -> RecommendationItem {
    let voters = self.votes.get(&reco.id);
    RecommendationItem {
      id: reco.id.clone(),
      name: reco.name.clone(),
      link: reco.link.clone(),
      media: reco.media,
      created_by: reco.created_by.clone(),
      upvote_count: voters.map_or(0, |v| v.len() as u32),
      is_upvoted_by: voters.is_some_and(|v| v.contains(user)),
    }
  }

  fn run(&mut self, operation: Operation) -> Result<Payload, TransportError> {
    match operation {
      Operation::FetchAll { user } => Ok(Payload::Items(
        self.recos.iter().map(|r| self.view(r, &user)).collect(),
      )),
      Operation::ToggleUpvote { user, id } => {
        if !self.recos.iter().any(|r| r.id == id) {
          return Err(TransportError::Rejected(format!("no recommendation {id}")));
        }
        let voters = self.votes.entry(id.clone()).or_default();
        if !voters.remove(&user) {
          voters.insert(user.clone());
        }
        Ok(Payload::Vote(VotePayload {
          upvote_count: voters.len() as u32,
          is_upvoted_by: voters.contains(&user),
          id,
        }))
      }
      Operation::Create { fields } => {
        // The creator comes from the authenticated session, not the request.
        let created_by = self
          .session
          .clone()
          .ok_or_else(|| TransportError::Rejected("not signed in".to_string()))?;
        self.next_id += 1;
        let id = RecoId::new(format!("reco-{}", self.next_id));
        self.recos.push(StoredReco {
          id: id.clone(),
          name: fields.name.clone(),
          link: fields.link.clone(),
          media: fields.media,
          created_by,
        });
        Ok(Payload::Created(CreatedPayload {
          id,
          name: fields.name,
          link: fields.link,
          media: fields.media,
        }))
      }
      Operation::Delete { id } => {
        self.recos.retain(|r| r.id != id);
        self.votes.remove(&id);
        Ok(Payload::Deleted(DeletedPayload { id }))
      }
    }
  }
}

/// Fake service with per-user vote state, a signed-in session, injectable
/// failures and a gate that holds requests until released.
pub struct FakeServer {
  state: Mutex<ServerState>,
  calls: AtomicUsize,
  held: AtomicBool,
  gate: Semaphore,
}

impl FakeServer {
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      state: Mutex::new(ServerState::default()),
      calls: AtomicUsize::new(0),
      held: AtomicBool::new(false),
      gate: Semaphore::new(0),
    })
  }

  pub fn with(self: Arc<Self>, reco: StoredReco) -> Arc<Self> {
    self.state.lock().unwrap().recos.push(reco);
    self
  }

  /// Record a vote cast by some user, bypassing any client.
  pub fn vote(&self, id: &str, user: &str) {
    self
      .state
      .lock()
      .unwrap()
      .votes
      .entry(RecoId::new(id))
      .or_default()
      .insert(UserId::new(user));
  }

  /// Authenticate as `user`; creates are attributed to the signed-in user.
  pub fn sign_in(&self, user: &str) {
    self.state.lock().unwrap().session = Some(UserId::new(user));
  }

  pub fn has(&self, id: &str) -> bool {
    self.state.lock().unwrap().recos.iter().any(|r| r.id.as_str() == id)
  }

  /// Make the next `n` operations fail.
  pub fn fail_next(&self, n: usize) {
    self.state.lock().unwrap().fail_next = n;
  }

  /// Answer the next operation with `payload` instead of running it.
  pub fn answer_next(&self, payload: Payload) {
    self.state.lock().unwrap().scripted.push_back(payload);
  }

  /// Hold every following request until `release` is called for it.
  pub fn hold(&self) {
    self.held.store(true, Ordering::SeqCst);
  }

  /// Let one held request through.
  pub fn release(&self) {
    self.gate.add_permits(1);
  }

  /// Number of operations received so far, including held ones.
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub async fn wait_for_calls(&self, n: usize) {
    while self.calls() < n {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }
  }
}

impl Transport for FakeServer {
  fn execute(&self, operation: Operation) -> BoxFuture<'_, Result<Payload, TransportError>> {
    Box::pin(async move {
      self.calls.fetch_add(1, Ordering::SeqCst);

      if self.held.load(Ordering::SeqCst) {
        self
          .gate
          .acquire()
          .await
          .map_err(|e| TransportError::Rejected(e.to_string()))?
          .forget();
      }

      let mut state = self.state.lock().unwrap();
      if state.fail_next > 0 {
        state.fail_next -= 1;
        return Err(TransportError::Rejected("injected failure".to_string()));
      }
      if let Some(payload) = state.scripted.pop_front() {
        return Ok(payload);
      }
      state.run(operation)
    })
  }
}
