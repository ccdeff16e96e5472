//! Profiles, attribute sets, and the candidate cards built from them.
//!
//! A profile is immutable once loaded for a session. Cards wrap a profile with
//! a score computed exactly once, when the discovery queue is built.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Identity of a user as assigned by the remote API.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

// ─── Attributes ──────────────────────────────────────────────────────────────

/// One of the five attribute categories compared by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Category {
  Likes,
  Dislikes,
  Fears,
  Traits,
  Habits,
}

/// The personal attributes a profile declares, one set per [`Category`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSets {
  #[serde(default)]
  pub likes:    BTreeSet<String>,
  #[serde(default)]
  pub dislikes: BTreeSet<String>,
  #[serde(default)]
  pub fears:    BTreeSet<String>,
  /// The profile endpoint calls this `personality_traits`; discovery calls it
  /// `traits`.
  #[serde(default, alias = "personality_traits")]
  pub traits:   BTreeSet<String>,
  #[serde(default)]
  pub habits:   BTreeSet<String>,
}

impl AttributeSets {
  pub fn get(&self, category: Category) -> &BTreeSet<String> {
    match category {
      Category::Likes => &self.likes,
      Category::Dislikes => &self.dislikes,
      Category::Fears => &self.fears,
      Category::Traits => &self.traits,
      Category::Habits => &self.habits,
    }
  }

  pub fn get_mut(&mut self, category: Category) -> &mut BTreeSet<String> {
    match category {
      Category::Likes => &mut self.likes,
      Category::Dislikes => &mut self.dislikes,
      Category::Fears => &mut self.fears,
      Category::Traits => &mut self.traits,
      Category::Habits => &mut self.habits,
    }
  }

  /// Builder-style insert, mostly useful in tests and fixtures.
  pub fn with<I, S>(mut self, category: Category, items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.get_mut(category).extend(items.into_iter().map(Into::into));
    self
  }

  pub fn is_empty(&self) -> bool {
    self.likes.is_empty()
      && self.dislikes.is_empty()
      && self.fears.is_empty()
      && self.traits.is_empty()
      && self.habits.is_empty()
  }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id:           UserId,
  pub display_name: String,
  pub age:          Option<u32>,
  pub location:     Option<String>,
  pub bio:          Option<String>,
  pub attributes:   AttributeSets,
}

/// The account record returned by `/login`, `/register`, and `/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:       UserId,
  pub username: String,
  pub email:    String,
  #[serde(default, rename = "hasCompletedProfile")]
  pub has_completed_profile: bool,
  #[serde(default)]
  pub is_premium: bool,
}

// ─── CandidateCard ───────────────────────────────────────────────────────────

/// A profile presented for a swipe decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCard {
  pub profile:            Profile,
  /// Always within `0..=100`; computed once when the card is built.
  pub match_score:        u8,
  pub mutual_connections: u32,
}

impl CandidateCard {
  /// Build a card from a score reported by the gateway rather than computed
  /// locally. The value is rounded and clamped into `0..=100`.
  pub fn with_reported_score(
    profile: Profile,
    reported: f64,
    mutual_connections: u32,
  ) -> Self {
    let match_score = if reported.is_finite() {
      reported.round().clamp(0.0, 100.0) as u8
    } else {
      0
    };
    Self { profile, match_score, mutual_connections }
  }

  pub fn id(&self) -> UserId { self.profile.id }
}
