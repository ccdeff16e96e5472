//! The swipe deck state machine behind the discovery feed.
//!
//! ```text
//!   load_queue(non-empty) ──► Idle ──decide──► Animating ──lock elapses──► Idle
//!                                                  │
//!                                                  └──(queue drained)──► Exhausted
//! ```
//!
//! The animation lock is time based rather than callback based. While the
//! lock is held the deck reports `Animating` and ignores further decisions;
//! once it elapses the deck reports the post-advance state immediately, and
//! the cursor itself is moved the next time the deck is mutated (or when
//! [`SwipeDeck::settle`] is called).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{
  Error,
  gateway::{LikeOutcome, MatchGateway},
  profile::{CandidateCard, UserId},
};

pub const DEFAULT_LOCK: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeckState {
  /// Showing the current candidate and accepting input.
  Idle,
  /// A decision was just made; input is locked.
  Animating,
  /// No candidates left. Terminal until reset or reload.
  Exhausted,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Verdict {
  Like,
  Dislike,
}

/// One entry in the append-only decision log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwipeDecision {
  pub candidate_id: UserId,
  pub verdict:      Verdict,
  pub decided_at:   DateTime<Utc>,
}

/// What [`SwipeDeck::decide_and_sync`] did.
#[derive(Debug)]
pub enum SwipeOutcome {
  /// The deck was not `Idle`; nothing was recorded or sent.
  Ignored,
  /// Recorded locally and acknowledged by the gateway. `like` is set for
  /// [`Verdict::Like`].
  Synced {
    decision: SwipeDecision,
    like:     Option<LikeOutcome>,
  },
  /// Recorded locally; the gateway call failed. The local decision stands.
  Unsynced {
    decision: SwipeDecision,
    error:    Error,
  },
}

impl SwipeOutcome {
  pub fn decision(&self) -> Option<&SwipeDecision> {
    match self {
      Self::Ignored => None,
      Self::Synced { decision, .. } | Self::Unsynced { decision, .. } => {
        Some(decision)
      }
    }
  }
}

#[derive(Debug)]
pub struct SwipeDeck {
  queue:           Vec<CandidateCard>,
  cursor:          usize,
  decisions:       Vec<SwipeDecision>,
  lock:            Duration,
  /// Set while a decision's animation lock is pending. The cursor still
  /// points at the decided candidate until the lock is settled.
  animating_until: Option<Instant>,
}

impl Default for SwipeDeck {
  fn default() -> Self { Self::new(DEFAULT_LOCK) }
}

impl SwipeDeck {
  /// An empty (and therefore `Exhausted`) deck with the given lock duration.
  pub fn new(lock: Duration) -> Self {
    Self {
      queue: Vec::new(),
      cursor: 0,
      decisions: Vec::new(),
      lock,
      animating_until: None,
    }
  }

  pub fn lock_duration(&self) -> Duration { self.lock }

  // ── Queue management ──────────────────────────────────────────────────────

  /// Replace the queue, rewind the cursor, and clear the decision log.
  pub fn load_queue(&mut self, candidates: Vec<CandidateCard>) {
    self.queue = candidates;
    self.rewind();
    debug!(len = self.queue.len(), state = %self.state(), "queue loaded");
  }

  /// Rewind over the existing queue, clearing the decision log.
  pub fn reset(&mut self) {
    self.rewind();
    debug!(len = self.queue.len(), state = %self.state(), "deck reset");
  }

  fn rewind(&mut self) {
    self.cursor = 0;
    self.decisions.clear();
    self.animating_until = None;
  }

  // ── Observation ───────────────────────────────────────────────────────────

  /// Cursor position as it will be once any elapsed lock is settled.
  fn effective_cursor(&self) -> usize {
    match self.animating_until {
      Some(until) if Instant::now() >= until => self.cursor + 1,
      _ => self.cursor,
    }
  }

  pub fn state(&self) -> DeckState {
    if let Some(until) = self.animating_until
      && Instant::now() < until
    {
      return DeckState::Animating;
    }
    if self.effective_cursor() < self.queue.len() {
      DeckState::Idle
    } else {
      DeckState::Exhausted
    }
  }

  /// The candidate on screen: the one being decided while `Animating`, the
  /// next one once idle, or `None` when exhausted.
  pub fn current(&self) -> Option<&CandidateCard> {
    match self.state() {
      DeckState::Exhausted => None,
      DeckState::Animating => self.queue.get(self.cursor),
      DeckState::Idle => self.queue.get(self.effective_cursor()),
    }
  }

  /// Zero-based index of the candidate on screen, clamped to the queue.
  pub fn position(&self) -> usize {
    match self.state() {
      DeckState::Animating => self.cursor,
      _ => self.effective_cursor().min(self.queue.len()),
    }
  }

  pub fn len(&self) -> usize { self.queue.len() }

  pub fn is_empty(&self) -> bool { self.queue.is_empty() }

  pub fn remaining(&self) -> usize {
    self.queue.len().saturating_sub(self.effective_cursor())
  }

  pub fn decisions(&self) -> &[SwipeDecision] { &self.decisions }

  pub fn queue(&self) -> &[CandidateCard] { &self.queue }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Apply an elapsed lock: advance the cursor and drop the lock.
  pub fn settle(&mut self) {
    if let Some(until) = self.animating_until
      && Instant::now() >= until
    {
      self.animating_until = None;
      self.cursor += 1;
      debug!(cursor = self.cursor, state = %self.state(), "deck advanced");
    }
  }

  /// Wait out any pending lock, then settle.
  pub async fn wait_settled(&mut self) {
    if let Some(until) = self.animating_until {
      tokio::time::sleep_until(until).await;
    }
    self.settle();
  }

  /// Record a verdict for the current candidate.
  ///
  /// Returns `false`, changing nothing, unless the deck is `Idle`.
  pub fn decide(&mut self, verdict: Verdict) -> bool {
    self.record(verdict).is_some()
  }

  fn record(&mut self, verdict: Verdict) -> Option<SwipeDecision> {
    self.settle();
    if self.state() != DeckState::Idle {
      debug!(%verdict, state = %self.state(), "decision ignored");
      return None;
    }
    let candidate = self.queue.get(self.cursor)?;
    let decision = SwipeDecision {
      candidate_id: candidate.id(),
      verdict,
      decided_at: Utc::now(),
    };
    self.decisions.push(decision.clone());
    self.animating_until = Some(Instant::now() + self.lock);
    debug!(candidate = %decision.candidate_id, %verdict, "decision recorded");
    Some(decision)
  }

  /// [`decide`](Self::decide), then mirror the verdict to the gateway.
  ///
  /// Local state is optimistic: a gateway failure is returned in
  /// [`SwipeOutcome::Unsynced`] and never rolls the decision back.
  pub async fn decide_and_sync<G: MatchGateway>(
    &mut self,
    verdict: Verdict,
    gateway: &G,
  ) -> SwipeOutcome {
    let Some(decision) = self.record(verdict) else {
      return SwipeOutcome::Ignored;
    };

    let result = match verdict {
      Verdict::Like => gateway.like(decision.candidate_id).await.map(Some),
      Verdict::Dislike => {
        gateway.dislike(decision.candidate_id).await.map(|()| None)
      }
    };

    match result {
      Ok(like) => SwipeOutcome::Synced { decision, like },
      Err(error) => {
        warn!(
          candidate = %decision.candidate_id,
          %verdict,
          error = %error,
          "gateway rejected swipe; keeping local decision"
        );
        SwipeOutcome::Unsynced { decision, error }
      }
    }
  }
}
