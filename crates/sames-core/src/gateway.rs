//! The API gateway seam.
//!
//! The core never performs network I/O itself. It emits intents through these
//! traits, which the CLI's HTTP client implements. Every call is a single
//! request/response with no retry; a failure is handed straight back to the
//! caller.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  error::ValidationError,
  profile::{User, UserId},
};

// ─── Request bodies ──────────────────────────────────────────────────────────

/// Body of `POST /login`. `email` may also hold the username.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
  pub email:    String,
  pub password: String,
}

impl Credentials {
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.email.trim().is_empty() {
      return Err(ValidationError::MissingField("email"));
    }
    if self.password.is_empty() {
      return Err(ValidationError::MissingField("password"));
    }
    Ok(())
  }
}

/// Body of `POST /register`. The confirmation never leaves the client.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
  pub username:         String,
  pub email:            String,
  pub password:         String,
  #[serde(skip)]
  pub confirm_password: String,
}

impl Registration {
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.username.trim().is_empty() {
      return Err(ValidationError::MissingField("username"));
    }
    if self.email.trim().is_empty() {
      return Err(ValidationError::MissingField("email"));
    }
    if self.password.is_empty() {
      return Err(ValidationError::MissingField("password"));
    }
    if self.password != self.confirm_password {
      return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
  }
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// `{user, token}` as returned by `/login` and `/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
  pub user:  User,
  pub token: String,
}

/// Result of `POST /matching/like/{id}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct LikeOutcome {
  /// Both sides have now liked each other.
  #[serde(default)]
  pub is_mutual:   bool,
  #[serde(default)]
  pub match_score: f64,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Account endpoints used by [`crate::session::SessionStore`].
pub trait AuthGateway: Send + Sync {
  /// `POST /login`
  fn login<'a>(
    &'a self,
    credentials: &'a Credentials,
  ) -> impl Future<Output = Result<AuthResponse>> + Send + 'a;

  /// `POST /register`
  fn register<'a>(
    &'a self,
    registration: &'a Registration,
  ) -> impl Future<Output = Result<AuthResponse>> + Send + 'a;
}

/// Swipe endpoints mirrored by [`crate::deck::SwipeDeck`].
pub trait MatchGateway: Send + Sync {
  /// `POST /matching/like/{id}`
  fn like(
    &self,
    candidate: UserId,
  ) -> impl Future<Output = Result<LikeOutcome>> + Send + '_;

  /// `POST /matching/dislike/{id}`
  fn dislike(
    &self,
    candidate: UserId,
  ) -> impl Future<Output = Result<()>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registration_rejects_mismatched_confirmation() {
    let reg = Registration {
      username:         "alex".into(),
      email:            "alex@example.com".into(),
      password:         "hunter2".into(),
      confirm_password: "hunter3".into(),
    };
    assert_eq!(reg.validate(), Err(ValidationError::PasswordMismatch));
  }

  #[test]
  fn registration_body_omits_confirmation() {
    let reg = Registration {
      username:         "alex".into(),
      email:            "alex@example.com".into(),
      password:         "pw".into(),
      confirm_password: "pw".into(),
    };
    let json = serde_json::to_value(&reg).unwrap();
    assert!(json.get("confirm_password").is_none());
    assert_eq!(json["username"], "alex");
  }

  #[test]
  fn credentials_require_email() {
    let creds = Credentials { email: "  ".into(), password: "pw".into() };
    assert_eq!(creds.validate(), Err(ValidationError::MissingField("email")));
  }
}
