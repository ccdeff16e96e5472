//! Compatibility scoring between two attribute sets.
//!
//! Each category contributes its Jaccard overlap (`|A ∩ B| / |A ∪ B|`),
//! weighted by [`ScoringWeights`]. Categories where neither side has any
//! entries are skipped entirely: they add nothing to the numerator or to the
//! weight total. If every category is skipped the score is 0.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::profile::{AttributeSets, CandidateCard, Category, Profile};

/// Relative weight of each category. Only ratios between weights matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
  pub likes:    f64,
  pub dislikes: f64,
  pub fears:    f64,
  pub traits:   f64,
  pub habits:   f64,
}

impl Default for ScoringWeights {
  fn default() -> Self {
    Self {
      likes:    0.25,
      dislikes: 0.20,
      fears:    0.15,
      traits:   0.25,
      habits:   0.15,
    }
  }
}

impl ScoringWeights {
  /// Weights that consider only `likes`.
  pub fn likes_only() -> Self {
    Self { likes: 1.0, dislikes: 0.0, fears: 0.0, traits: 0.0, habits: 0.0 }
  }

  pub fn weight(&self, category: Category) -> f64 {
    match category {
      Category::Likes => self.likes,
      Category::Dislikes => self.dislikes,
      Category::Fears => self.fears,
      Category::Traits => self.traits,
      Category::Habits => self.habits,
    }
  }
}

/// Pure, deterministic scorer. Cheap to copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatibilityScorer {
  weights: ScoringWeights,
}

impl CompatibilityScorer {
  pub fn new(weights: ScoringWeights) -> Self { Self { weights } }

  pub fn weights(&self) -> &ScoringWeights { &self.weights }

  /// Score `a` against `b` on a `0..=100` scale.
  pub fn score(&self, a: &AttributeSets, b: &AttributeSets) -> u8 {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;

    for category in Category::iter() {
      let weight = self.weights.weight(category);
      if weight <= 0.0 {
        continue;
      }
      let Some(ratio) = overlap(a.get(category), b.get(category)) else {
        continue;
      };
      weighted += ratio * weight;
      total_weight += weight;
    }

    if total_weight <= 0.0 {
      return 0;
    }
    (weighted / total_weight * 100.0).round().clamp(0.0, 100.0) as u8
  }

  /// Build a [`CandidateCard`] scored against the viewer's own attributes.
  pub fn card(
    &self,
    viewer: &AttributeSets,
    profile: Profile,
    mutual_connections: u32,
  ) -> CandidateCard {
    let match_score = self.score(viewer, &profile.attributes);
    CandidateCard { profile, match_score, mutual_connections }
  }
}

/// Jaccard overlap after normalisation, or `None` when the union is empty.
fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Option<f64> {
  let a = normalise(a);
  let b = normalise(b);
  let union = a.union(&b).count();
  if union == 0 {
    return None;
  }
  let intersection = a.intersection(&b).count();
  Some(intersection as f64 / union as f64)
}

fn normalise(set: &BTreeSet<String>) -> BTreeSet<String> {
  set
    .iter()
    .map(|s| s.trim().to_lowercase())
    .filter(|s| !s.is_empty())
    .collect()
}
