//! Async HTTP client wrapping the Sames JSON API.
//!
//! Auth headers come from the shared [`SessionStore`] on every request, so a
//! login or logout elsewhere takes effect on the very next call. Nothing is
//! retried: a failure is mapped onto [`sames_core::Error`] and returned.

use std::{collections::BTreeSet, time::Duration};

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use sames_core::{
  AuthError, Error, Result,
  gateway::{
    AuthGateway, AuthResponse, Credentials, LikeOutcome, MatchGateway,
    Registration,
  },
  profile::{AttributeSets, CandidateCard, Profile, User, UserId},
  score::CompatibilityScorer,
  session::SessionStore,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

/// Connection settings for the Sames API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout:  Duration,
}

/// Async HTTP client for the Sames REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] and the session handle are
/// both `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:  Client,
  config:  ApiConfig,
  session: SessionStore,
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorBody {
  error: Option<String>,
}

#[derive(Deserialize)]
struct UserEnvelope {
  user: User,
}

#[derive(Deserialize)]
struct ProfileEnvelope {
  profile: ProfileRecord,
}

#[derive(Deserialize)]
struct MatchesEnvelope<T> {
  matches: Vec<T>,
}

/// A profile as stored by the API (`/profile`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRecord {
  pub user_id:        UserId,
  pub age:            Option<u32>,
  pub location:       Option<String>,
  pub bio:            Option<String>,
  #[serde(flatten)]
  pub attributes:     AttributeSets,
  #[serde(default)]
  pub is_private:     bool,
  #[serde(default = "default_true")]
  pub allow_matching: bool,
}

fn default_true() -> bool { true }

impl ProfileRecord {
  pub fn into_profile(self, display_name: String) -> Profile {
    Profile {
      id: self.user_id,
      display_name,
      age: self.age,
      location: self.location,
      bio: self.bio,
      attributes: self.attributes,
    }
  }
}

/// Body of `POST /profile`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
  pub age:                Option<u32>,
  pub location:           Option<String>,
  pub bio:                Option<String>,
  pub personality_traits: BTreeSet<String>,
  pub likes:              BTreeSet<String>,
  pub dislikes:           BTreeSet<String>,
  pub fears:              BTreeSet<String>,
  pub habits:             BTreeSet<String>,
  pub is_private:         bool,
  pub allow_matching:     bool,
}

/// One entry of `GET /matching/discover`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredCandidate {
  pub id:             UserId,
  pub name:           String,
  pub age:            Option<u32>,
  pub location:       Option<String>,
  pub bio:            Option<String>,
  #[serde(default)]
  pub match_score:    f64,
  #[serde(default)]
  pub commonalities:  AttributeSets,
  #[serde(default)]
  pub mutual_friends: u32,
}

impl DiscoveredCandidate {
  /// Score against `viewer` when known; otherwise keep the API's score.
  ///
  /// Discovery never reports habits, so the viewer's habits are left out of
  /// the local score rather than counted as a mismatch.
  pub fn into_card(
    self,
    scorer: &CompatibilityScorer,
    viewer: Option<&AttributeSets>,
  ) -> CandidateCard {
    let reported = self.match_score;
    let mutual = self.mutual_friends;
    let profile = Profile {
      id:           self.id,
      display_name: self.name,
      age:          self.age,
      location:     self.location,
      bio:          self.bio,
      attributes:   self.commonalities,
    };
    match viewer {
      Some(viewer) => {
        let mut viewer = viewer.clone();
        viewer.habits.clear();
        scorer.card(&viewer, profile, mutual)
      }
      None => CandidateCard::with_reported_score(profile, reported, mutual),
    }
  }
}

/// One entry of `GET /matching/matches`.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchSummary {
  pub match_id:    i64,
  pub user:        MatchedUser,
  #[serde(default)]
  pub match_score: f64,
  pub matched_at:  Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchedUser {
  pub id:       UserId,
  pub username: String,
  pub age:      Option<u32>,
  pub location: Option<String>,
  pub bio:      Option<String>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

impl ApiClient {
  pub fn new(config: ApiConfig, session: SessionStore) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config, session })
  }

  pub fn session(&self) -> &SessionStore { &self.session }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// A request without credentials (`/login`, `/register`).
  fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
    self.client.request(method, self.url(path))
  }

  /// A request carrying the current bearer token. Refuses locally when the
  /// token is missing or expired.
  fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
    self.session.require_token()?;
    let mut req = self.client.request(method, self.url(path));
    for (name, value) in self.session.current_auth_header() {
      req = req.header(name, value);
    }
    Ok(req)
  }

  async fn send<T: DeserializeOwned>(
    &self,
    req: RequestBuilder,
    what: &str,
  ) -> Result<T> {
    let resp = req
      .send()
      .await
      .map_err(|e| Error::Network(format!("{what} failed: {e}")))?;
    let status = resp.status();
    let body = resp
      .bytes()
      .await
      .map_err(|e| Error::Network(format!("{what}: reading body: {e}")))?;
    debug!(%status, what, "api response");

    if !status.is_success() {
      return Err(error_for(status, &body, what));
    }
    serde_json::from_slice(&body)
      .map_err(|e| Error::Network(format!("{what}: malformed response: {e}")))
  }

  // ── Account ───────────────────────────────────────────────────────────────

  /// `GET /me`
  pub async fn me(&self) -> Result<User> {
    let req = self.authed(Method::GET, "/me")?;
    let envelope: UserEnvelope = self.send(req, "GET /me").await?;
    Ok(envelope.user)
  }

  /// `GET /profile`
  pub async fn profile(&self) -> Result<ProfileRecord> {
    let req = self.authed(Method::GET, "/profile")?;
    let envelope: ProfileEnvelope = self.send(req, "GET /profile").await?;
    Ok(envelope.profile)
  }

  /// `POST /profile`
  pub async fn create_profile(&self, profile: &NewProfile) -> Result<ProfileRecord> {
    let req = self.authed(Method::POST, "/profile")?.json(profile);
    let envelope: ProfileEnvelope = self.send(req, "POST /profile").await?;
    Ok(envelope.profile)
  }

  // ── Matching ──────────────────────────────────────────────────────────────

  /// `GET /matching/discover`, in the order the API returned them.
  pub async fn discover(&self) -> Result<Vec<DiscoveredCandidate>> {
    let req = self.authed(Method::GET, "/matching/discover")?;
    let envelope: MatchesEnvelope<DiscoveredCandidate> =
      self.send(req, "GET /matching/discover").await?;
    Ok(envelope.matches)
  }

  /// `GET /matching/matches`
  pub async fn matches(&self) -> Result<Vec<MatchSummary>> {
    let req = self.authed(Method::GET, "/matching/matches")?;
    let envelope: MatchesEnvelope<MatchSummary> =
      self.send(req, "GET /matching/matches").await?;
    Ok(envelope.matches)
  }
}

/// Map a non-2xx response onto the error taxonomy, preferring the API's own
/// `error` message when it sent one.
fn error_for(status: StatusCode, body: &[u8], what: &str) -> Error {
  let message = serde_json::from_slice::<ErrorBody>(body)
    .ok()
    .and_then(|b| b.error)
    .unwrap_or_else(|| "API request failed".to_string());

  match status {
    StatusCode::UNAUTHORIZED => AuthError::Rejected(message).into(),
    _ => Error::Network(format!("{what} → {status}: {message}")),
  }
}

impl AuthGateway for ApiClient {
  async fn login<'a>(&'a self, credentials: &'a Credentials) -> Result<AuthResponse> {
    let req = self.anonymous(Method::POST, "/login").json(credentials);
    self.send(req, "POST /login").await
  }

  async fn register<'a>(
    &'a self,
    registration: &'a Registration,
  ) -> Result<AuthResponse> {
    let req = self.anonymous(Method::POST, "/register").json(registration);
    self.send(req, "POST /register").await
  }
}

impl MatchGateway for ApiClient {
  async fn like(&self, candidate: UserId) -> Result<LikeOutcome> {
    let path = format!("/matching/like/{candidate}");
    let req = self.authed(Method::POST, &path)?;
    self.send(req, &format!("POST {path}")).await
  }

  async fn dislike(&self, candidate: UserId) -> Result<()> {
    let path = format!("/matching/dislike/{candidate}");
    let req = self.authed(Method::POST, &path)?;
    let _: serde_json::Value = self.send(req, &format!("POST {path}")).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use sames_core::score::ScoringWeights;

  use super::*;

  #[test]
  fn error_field_is_surfaced() {
    let err = error_for(
      StatusCode::BAD_REQUEST,
      br#"{"error": "Match already exists"}"#,
      "POST /matching/like/3",
    );
    assert!(err.to_string().contains("Match already exists"));
  }

  #[test]
  fn missing_error_field_is_generic() {
    let err = error_for(StatusCode::INTERNAL_SERVER_ERROR, b"<html>", "GET /me");
    assert!(matches!(err, Error::Network(ref m) if m.contains("API request failed")));
  }

  #[test]
  fn unauthorized_maps_to_auth_error() {
    let err = error_for(
      StatusCode::UNAUTHORIZED,
      br#"{"error": "Invalid or expired token"}"#,
      "GET /me",
    );
    assert!(matches!(err, Error::Auth(AuthError::Rejected(_))));
  }

  #[test]
  fn discovered_candidate_is_rescored_locally() {
    let raw = r#"{
      "id": 1,
      "name": "Alex K",
      "age": 28,
      "location": "New York, USA",
      "bio": "Creative soul",
      "match_score": 92.4,
      "commonalities": {
        "likes": ["Art", "Technology", "Coffee"],
        "dislikes": ["Crowds"],
        "fears": [],
        "traits": ["Creative"]
      },
      "mutual_friends": 5
    }"#;
    let candidate: DiscoveredCandidate = serde_json::from_str(raw).unwrap();
    let scorer = CompatibilityScorer::new(ScoringWeights::likes_only());

    let viewer = AttributeSets::default()
      .with(sames_core::profile::Category::Likes, ["art", "coffee"]);
    let card = candidate.clone().into_card(&scorer, Some(&viewer));
    assert_eq!(card.match_score, 67);
    assert_eq!(card.mutual_connections, 5);
    assert!(card.profile.attributes.traits.contains("Creative"));

    let fallback = candidate.into_card(&scorer, None);
    assert_eq!(fallback.match_score, 92);
  }

  #[test]
  fn viewer_habits_do_not_drag_down_discovered_scores() {
    let raw = r#"{
      "id": 5, "name": "Rae", "match_score": 40.0,
      "commonalities": {"likes": ["Hiking"], "dislikes": [], "fears": [], "traits": []}
    }"#;
    let candidate: DiscoveredCandidate = serde_json::from_str(raw).unwrap();
    let viewer = AttributeSets::default()
      .with(sames_core::profile::Category::Likes, ["hiking"])
      .with(sames_core::profile::Category::Habits, ["Running", "Journaling"]);

    let card = candidate.into_card(&CompatibilityScorer::default(), Some(&viewer));
    assert_eq!(card.match_score, 100);
  }

  #[test]
  fn profile_record_reads_personality_traits() {
    let raw = r#"{"profile": {
      "id": 4, "user_id": 9, "age": 25, "location": "Brooklyn, NY",
      "bio": null, "profile_picture_url": null,
      "personality_traits": ["Quiet"], "likes": ["Books"], "dislikes": [],
      "fears": [], "habits": ["Reading"],
      "is_private": false, "allow_matching": true
    }}"#;
    let envelope: ProfileEnvelope = serde_json::from_str(raw).unwrap();
    let profile = envelope.profile.into_profile("sarah".into());
    assert_eq!(profile.id, UserId(9));
    assert!(profile.attributes.traits.contains("Quiet"));
    assert!(profile.attributes.habits.contains("Reading"));
  }

  #[test]
  fn new_profile_uses_camel_case_keys() {
    let body = serde_json::to_value(NewProfile {
      allow_matching: true,
      ..NewProfile::default()
    })
    .unwrap();
    assert_eq!(body["allowMatching"], true);
    assert!(body.get("personalityTraits").is_some());
  }

  #[tokio::test]
  async fn anonymous_session_is_refused_before_any_request() {
    let client = ApiClient::new(
      ApiConfig {
        base_url: "http://127.0.0.1:9".into(),
        timeout:  Duration::from_secs(1),
      },
      SessionStore::in_memory(),
    )
    .unwrap();
    let err = client.discover().await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::MissingToken)));
  }
}
