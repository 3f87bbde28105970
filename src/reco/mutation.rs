//! Observable handle for an in-flight mutation.
//!
//! A handle is returned by every mutation entry point once the optimistic
//! write (if any) is in the cache. The submission and settlement run on a
//! spawned task. Callers may poll the handle from an event loop or simply
//! await it; they cannot cancel it.
//!
//! # Example
//!
//! ```ignore
//! let mut handle = client.toggle_upvote(&user, &item)?;
//!
//! // In event loop tick
//! if handle.poll() {
//!     // Settled, re-render from the cache
//! }
//!
//! // Or just wait
//! let confirmed = handle.wait().await?;
//! ```

use std::future::Future;
use tokio::sync::oneshot;

use crate::error::{SyncError, SyncResult};

/// The state of a mutation as seen by its caller
#[derive(Debug)]
pub enum MutationState<T> {
  /// Submitted, waiting for the server
  Pending,
  /// Server confirmed; the cache holds the authoritative result
  Confirmed(T),
  /// Server refused or was unreachable; any optimistic write was undone
  Failed(SyncError),
}

impl<T> MutationState<T> {
  pub fn is_pending(&self) -> bool {
    matches!(self, MutationState::Pending)
  }
}

/// Handle on a mutation running in the background.
pub struct MutationHandle<T> {
  state: MutationState<T>,
  receiver: Option<oneshot::Receiver<SyncResult<T>>>,
  preview: Option<T>,
}

impl<T: Send + 'static> MutationHandle<T> {
  /// Run `settle` on a new task and return a handle observing it.
  pub(crate) fn spawn<Fut>(settle: Fut) -> Self
  where
    Fut: Future<Output = SyncResult<T>> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      // Ignore send errors - the handle may have been dropped
      let _ = tx.send(settle.await);
    });

    Self {
      state: MutationState::Pending,
      receiver: Some(rx),
      preview: None,
    }
  }

  /// Attach a locally predicted value a UI may show while pending.
  pub(crate) fn with_preview(mut self, preview: T) -> Self {
    self.preview = Some(preview);
    self
  }
}

impl<T> MutationHandle<T> {
  pub fn state(&self) -> &MutationState<T> {
    &self.state
  }

  pub fn is_pending(&self) -> bool {
    self.state.is_pending()
  }

  /// Provisional value, if the mutation produced one (creates do).
  pub fn preview(&self) -> Option<&T> {
    self.preview.as_ref()
  }

  /// Check for settlement without blocking.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(result) => {
        self.settle(result);
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.settle(Err(SyncError::Aborted));
        true
      }
    }
  }

  /// Wait for settlement and take the outcome.
  pub async fn wait(mut self) -> SyncResult<T> {
    if let Some(rx) = self.receiver.take() {
      return rx.await.unwrap_or(Err(SyncError::Aborted));
    }

    match std::mem::replace(&mut self.state, MutationState::Pending) {
      MutationState::Confirmed(value) => Ok(value),
      MutationState::Failed(e) => Err(e),
      MutationState::Pending => Err(SyncError::Aborted),
    }
  }

  fn settle(&mut self, result: SyncResult<T>) {
    self.receiver = None;
    self.state = match result {
      Ok(value) => MutationState::Confirmed(value),
      Err(e) => MutationState::Failed(e),
    };
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MutationHandle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MutationHandle")
      .field("state", &self.state)
      .field("preview", &self.preview)
      .finish_non_exhaustive()
  }
}
