//! Error types for `sames-core`.
//!
//! Debounced input (a swipe while the deck is animating, a reply firing into a
//! disposed thread) is not an error and never surfaces here; those calls are
//! silent no-ops by contract.

use thiserror::Error;

/// Input rejected locally, before anything reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("message text is empty")]
  EmptyMessage,

  #[error("password confirmation does not match")]
  PasswordMismatch,

  #[error("missing required field: {0}")]
  MissingField(&'static str),
}

/// Authentication failures, whether reported by the gateway or detected
/// locally from the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
  #[error("rejected by server: {0}")]
  Rejected(String),

  #[error("no session token")]
  MissingToken,

  #[error("session token expired")]
  Expired,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Auth(#[from] AuthError),

  /// The request failed, or the response could not be understood.
  #[error("network error: {0}")]
  Network(String),

  #[error("storage error: {0}")]
  Storage(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
