//! Error taxonomy for the sync layer.

use thiserror::Error;

/// Errors surfaced by the cache and mutation coordinator.
#[derive(Debug, Error)]
pub enum SyncError {
  /// A reconciliation ran before any fetch populated the scope.
  #[error("no cached collection for `{scope}`; fetch it before mutating")]
  NotCached { scope: String },

  /// The targeted entity is not present in the cached collection.
  #[error("item `{id}` is not in the cached collection for `{scope}`")]
  UnknownItem { scope: String, id: String },

  /// The remote call failed. Local compensation has already run.
  #[error("mutation did not take effect: {0}")]
  Transport(#[from] TransportError),

  /// A transform would have produced an inconsistent collection.
  #[error("cache invariant violated: {0}")]
  InvariantViolation(String),

  #[error("cache lock poisoned: {0}")]
  LockPoisoned(String),

  /// The task driving a mutation stopped before it settled.
  #[error("mutation task ended before settling")]
  Aborted,
}

impl SyncError {
  /// True for failures reported by the transport collaborator.
  pub fn is_transport(&self) -> bool {
    matches!(self, SyncError::Transport(_))
  }
}

/// Failures of the external query/mutation execution facility.
///
/// Every variant is treated the same way by the coordinator: the optimistic
/// write is compensated and the mutation is reported as not applied.
#[derive(Debug, Error)]
pub enum TransportError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("server answered with status {0}")]
  Status(reqwest::StatusCode),

  #[error("server reported errors: {}", .0.join("; "))]
  GraphQl(Vec<String>),

  #[error("failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("request timed out")]
  Timeout,

  #[error("unexpected payload for {operation}")]
  UnexpectedPayload { operation: &'static str },

  /// Refused by the server or a test double without further detail.
  #[error("{0}")]
  Rejected(String),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
