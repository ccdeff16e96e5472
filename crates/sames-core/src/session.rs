//! Session and auth-token lifecycle.
//!
//! [`SessionStore`] is the single owner of the token. It is a cheap-to-clone
//! handle: the HTTP client holds one clone to build auth headers and the UI
//! holds another to log in and out. Every read sees the latest write.

use std::{
  collections::BTreeMap,
  sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::{
  Result,
  error::AuthError,
  gateway::{AuthGateway, AuthResponse, Credentials, Registration},
  profile::{Profile, User, UserId},
  storage::{MemorySessionStorage, SessionBlob, SessionStorage},
};

pub const AUTHORIZATION: &str = "Authorization";

/// Default lifetime of a freshly issued token.
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

/// Snapshot of the authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub user_id:    UserId,
  /// Present iff the session is authenticated.
  pub token:      Option<String>,
  pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
  pub fn is_authenticated(&self) -> bool { self.token.is_some() }

  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| at <= now)
  }
}

#[derive(Debug, Default)]
struct SessionState {
  user:       Option<User>,
  token:      Option<String>,
  expires_at: Option<DateTime<Utc>>,
  profile:    Option<Profile>,
  /// Bumped on every login and logout so owners of decks and threads can tell
  /// their state belongs to a previous session.
  epoch:      u64,
}

#[derive(Clone)]
pub struct SessionStore {
  state:     Arc<RwLock<SessionState>>,
  storage:   Arc<dyn SessionStorage>,
  token_ttl: Duration,
}

impl SessionStore {
  pub fn new(storage: Arc<dyn SessionStorage>, token_ttl: Duration) -> Self {
    Self {
      state: Arc::new(RwLock::new(SessionState::default())),
      storage,
      token_ttl,
    }
  }

  /// A store backed by [`MemorySessionStorage`] with the default token TTL.
  pub fn in_memory() -> Self {
    Self::new(
      Arc::new(MemorySessionStorage::new()),
      Duration::days(DEFAULT_TOKEN_TTL_DAYS),
    )
  }

  fn read(&self) -> RwLockReadGuard<'_, SessionState> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }

  // ── Restore ───────────────────────────────────────────────────────────────

  /// Reload the persisted blob and token. Returns whether a user was found.
  ///
  /// A token without a blob is still restored: requests will carry it even
  /// though the user identity is unknown until `/me` is fetched. A token with
  /// no recorded expiry is given a fresh TTL from now.
  pub fn restore(&self) -> Result<bool> {
    let blob = self.storage.load_blob()?;
    let token = self.storage.load_token()?;

    let mut state = self.write();
    let found = match blob {
      Some(blob) => {
        state.user = Some(blob.user);
        state.expires_at = blob.expires_at;
        state.profile = blob.profile;
        true
      }
      None => false,
    };
    if token.is_some() && state.expires_at.is_none() {
      state.expires_at = Some(Utc::now() + self.token_ttl);
    }
    state.token = token;
    debug!(epoch = state.epoch, found, "session restored");
    Ok(found)
  }

  // ── Token ─────────────────────────────────────────────────────────────────

  /// Replace the token and persist the change. A different token bumps the
  /// epoch; `None` is a [`logout`](Self::logout).
  pub fn set_token(&self, token: Option<String>) -> Result<()> {
    let Some(token) = token else {
      return self.logout();
    };
    self.storage.save_token(Some(&token))?;

    let mut state = self.write();
    let expires_at = Utc::now() + self.token_ttl;
    state.expires_at = Some(expires_at);
    if let Some(user) = state.user.clone() {
      self.storage.save_blob(&SessionBlob {
        user,
        expires_at: Some(expires_at),
        profile: state.profile.clone(),
      })?;
    }
    if state.token.as_deref() != Some(token.as_str()) {
      state.epoch += 1;
      debug!(epoch = state.epoch, "token replaced");
    }
    state.token = Some(token);
    Ok(())
  }

  pub fn token(&self) -> Option<String> { self.read().token.clone() }

  /// The token, if one is set and not yet expired.
  pub fn require_token(&self) -> Result<String, AuthError> {
    let state = self.read();
    let token = state.token.clone().ok_or(AuthError::MissingToken)?;
    if state.expires_at.is_some_and(|at| at <= Utc::now()) {
      return Err(AuthError::Expired);
    }
    Ok(token)
  }

  /// Headers to attach to an outgoing request. Empty when anonymous.
  pub fn current_auth_header(&self) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    if let Some(token) = &self.read().token {
      headers.insert(AUTHORIZATION.to_string(), format!("Bearer {token}"));
    }
    headers
  }

  // ── Identity ──────────────────────────────────────────────────────────────

  pub fn session(&self) -> Option<Session> {
    let state = self.read();
    state.user.as_ref().map(|user| Session {
      user_id:    user.id,
      token:      state.token.clone(),
      expires_at: state.expires_at,
    })
  }

  pub fn current_user(&self) -> Option<User> { self.read().user.clone() }

  pub fn is_authenticated(&self) -> bool { self.read().token.is_some() }

  pub fn epoch(&self) -> u64 { self.read().epoch }

  pub fn cached_profile(&self) -> Option<Profile> {
    self.read().profile.clone()
  }

  /// Cache the current user's profile alongside the session blob.
  pub fn set_profile(&self, profile: Profile) -> Result<()> {
    let mut state = self.write();
    state.profile = Some(profile);
    if let Some(user) = state.user.clone() {
      self.storage.save_blob(&SessionBlob {
        user,
        expires_at: state.expires_at,
        profile: state.profile.clone(),
      })?;
    }
    Ok(())
  }

  /// Replace the cached user record, e.g. after a `/me` refresh.
  pub fn set_user(&self, user: User) -> Result<()> {
    let mut state = self.write();
    self.storage.save_blob(&SessionBlob {
      user:       user.clone(),
      expires_at: state.expires_at,
      profile:    state.profile.clone(),
    })?;
    state.user = Some(user);
    Ok(())
  }

  // ── Login / logout ────────────────────────────────────────────────────────

  pub async fn login<G: AuthGateway>(
    &self,
    gateway: &G,
    credentials: &Credentials,
  ) -> Result<Session> {
    credentials.validate()?;
    let response = gateway.login(credentials).await.inspect_err(|e| {
      warn!(error = %e, "login failed");
    })?;
    self.establish(response)
  }

  pub async fn register<G: AuthGateway>(
    &self,
    gateway: &G,
    registration: &Registration,
  ) -> Result<Session> {
    registration.validate()?;
    let response = gateway.register(registration).await.inspect_err(|e| {
      warn!(error = %e, "registration failed");
    })?;
    self.establish(response)
  }

  fn establish(&self, response: AuthResponse) -> Result<Session> {
    let AuthResponse { user, token } = response;
    let expires_at = Utc::now() + self.token_ttl;

    self.storage.save_token(Some(&token))?;
    self.storage.save_blob(&SessionBlob {
      user:       user.clone(),
      expires_at: Some(expires_at),
      profile:    None,
    })?;

    let mut state = self.write();
    state.epoch += 1;
    state.user = Some(user.clone());
    state.token = Some(token.clone());
    state.expires_at = Some(expires_at);
    state.profile = None;
    info!(user_id = %user.id, epoch = state.epoch, "logged in");

    Ok(Session {
      user_id:    user.id,
      token:      Some(token),
      expires_at: Some(expires_at),
    })
  }

  /// Drop the token, user, and cached profile, and clear both persisted
  /// entries. Calling this while already logged out changes nothing.
  pub fn logout(&self) -> Result<()> {
    let mut state = self.write();
    let had_session = state.token.is_some() || state.user.is_some();
    state.token = None;
    state.user = None;
    state.expires_at = None;
    state.profile = None;
    if had_session {
      state.epoch += 1;
      info!(epoch = state.epoch, "logged out");
    }
    drop(state);
    self.storage.clear()
  }
}

impl std::fmt::Debug for SessionStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.read();
    f.debug_struct("SessionStore")
      .field("user", &state.user.as_ref().map(|u| u.id))
      .field("authenticated", &state.token.is_some())
      .field("epoch", &state.epoch)
      .finish()
  }
}
