//! The `SessionStorage` trait and an in-memory implementation.
//!
//! Persisted client state is exactly two entries: the serialised session blob
//! (current user, expiry, cached profile) and the raw token string. They are
//! written independently but always cleared together.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  profile::{Profile, User},
};

/// Everything about the session except the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBlob {
  pub user:       User,
  pub expires_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub profile:    Option<Profile>,
}

/// Backing store for [`crate::session::SessionStore`].
///
/// Implementations are synchronous; the entries are tiny and written rarely.
pub trait SessionStorage: Send + Sync {
  fn load_blob(&self) -> Result<Option<SessionBlob>>;

  fn save_blob(&self, blob: &SessionBlob) -> Result<()>;

  fn load_token(&self) -> Result<Option<String>>;

  /// Persist `token`, or remove the entry when `None`.
  fn save_token(&self, token: Option<&str>) -> Result<()>;

  /// Remove both entries. Must succeed when nothing is stored.
  fn clear(&self) -> Result<()>;
}

/// Volatile storage for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
  entries: Mutex<(Option<SessionBlob>, Option<String>)>,
}

impl MemorySessionStorage {
  pub fn new() -> Self { Self::default() }
}

impl SessionStorage for MemorySessionStorage {
  fn load_blob(&self) -> Result<Option<SessionBlob>> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(entries.0.clone())
  }

  fn save_blob(&self, blob: &SessionBlob) -> Result<()> {
    let mut entries =
      self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.0 = Some(blob.clone());
    Ok(())
  }

  fn load_token(&self) -> Result<Option<String>> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(entries.1.clone())
  }

  fn save_token(&self, token: Option<&str>) -> Result<()> {
    let mut entries =
      self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.1 = token.map(str::to_owned);
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let mut entries =
      self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    *entries = (None, None);
    Ok(())
  }
}
