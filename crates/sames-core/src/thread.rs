//! Per-counterpart conversation threads.
//!
//! A thread is an ordered log: `sent_at` never decreases from one message to
//! the next. Outgoing messages are appended (their timestamp is clamped so the
//! order holds even if the wall clock steps back); messages with an explicit
//! timestamp are inserted at the position that keeps the order.
//!
//! Simulated replies run as spawned tasks holding only a weak reference to
//! the thread. Dropping the thread cancels them, and a task that wakes after
//! the thread is gone does nothing.

use std::{
  ops::Range,
  sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{error::ValidationError, profile::UserId};

/// Replies used when no script is configured.
pub const DEFAULT_REPLIES: &[&str] = &[
  "That sounds great!",
  "I'm looking forward to it!",
  "Absolutely! Let's make it happen.",
  "Perfect! I'll send you the details.",
  "Can't wait to meet you!",
];

pub const DEFAULT_REPLY_DELAY: Range<Duration> =
  Duration::from_millis(1000)..Duration::from_millis(3000);

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
  Sent,
  /// Delivery failed. The message stays in the thread.
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  /// Unique within the thread; increases with creation order.
  pub id:        u64,
  pub sender_id: UserId,
  /// Trimmed and never empty.
  pub text:      String,
  pub sent_at:   DateTime<Utc>,
  pub delivery:  DeliveryState,
}

// ─── Date grouping ───────────────────────────────────────────────────────────

/// Messages from one calendar day, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup {
  /// `"Today"`, `"Yesterday"`, or `M/D/YYYY`.
  pub label:    String,
  pub date:     NaiveDate,
  pub messages: Vec<Message>,
}

impl DateGroup {
  /// Each message paired with whether to show the sender marker (avatar):
  /// true for the first message of the group and wherever the sender changes.
  pub fn entries(&self) -> impl Iterator<Item = (&Message, bool)> + '_ {
    self.messages.iter().enumerate().map(|(i, msg)| {
      let show = i == 0 || self.messages[i - 1].sender_id != msg.sender_id;
      (msg, show)
    })
  }
}

fn day_label(day: NaiveDate, today: NaiveDate) -> String {
  if day == today {
    "Today".to_string()
  } else if today.pred_opt() == Some(day) {
    "Yesterday".to_string()
  } else {
    day.format("%-m/%-d/%Y").to_string()
  }
}

// ─── Thread state ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ThreadState {
  messages:  Vec<Message>,
  next_id:   u64,
  /// Cancellation tokens of replies that have not fired yet.
  pending:   Vec<(u64, CancellationToken)>,
  next_task: u64,
  disposed:  bool,
}

impl ThreadState {
  fn create(
    &mut self,
    sender_id: UserId,
    text: String,
    sent_at: DateTime<Utc>,
  ) -> Message {
    let message = Message {
      id: self.next_id,
      sender_id,
      text,
      sent_at,
      delivery: DeliveryState::Sent,
    };
    self.next_id += 1;
    message
  }

  fn append(
    &mut self,
    sender_id: UserId,
    text: String,
    now: DateTime<Utc>,
  ) -> Message {
    let sent_at = match self.messages.last() {
      Some(last) if last.sent_at > now => last.sent_at,
      _ => now,
    };
    let message = self.create(sender_id, text, sent_at);
    self.messages.push(message.clone());
    message
  }

  fn insert(
    &mut self,
    sender_id: UserId,
    text: String,
    sent_at: DateTime<Utc>,
  ) -> Message {
    let message = self.create(sender_id, text, sent_at);
    let at = self.messages.partition_point(|m| m.sent_at <= sent_at);
    self.messages.insert(at, message.clone());
    message
  }
}

fn validate_text(text: &str) -> Result<String, ValidationError> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return Err(ValidationError::EmptyMessage);
  }
  Ok(trimmed.to_string())
}

fn lock(state: &Mutex<ThreadState>) -> MutexGuard<'_, ThreadState> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Reply handle ────────────────────────────────────────────────────────────

/// Handle to a scheduled simulated reply.
#[derive(Debug)]
pub struct ReplyHandle {
  token: CancellationToken,
  task:  JoinHandle<()>,
}

impl ReplyHandle {
  /// Cancel the reply. If it has not fired yet, it never will.
  pub fn cancel(&self) { self.token.cancel(); }

  pub fn is_finished(&self) -> bool { self.task.is_finished() }

  /// Wait for the task to fire or observe its cancellation.
  pub async fn join(self) {
    // The task body cannot panic; a JoinError here means the runtime is
    // shutting down, which leaves nothing to wait for.
    let _ = self.task.await;
  }
}

// ─── ConversationThread ──────────────────────────────────────────────────────

/// The message log shared with one counterpart.
///
/// Not `Clone`: there is exactly one owner, and dropping it disposes the
/// thread.
#[derive(Debug)]
pub struct ConversationThread {
  counterpart: UserId,
  state:       Arc<Mutex<ThreadState>>,
  replies:     Vec<String>,
}

impl ConversationThread {
  pub fn new(counterpart: UserId) -> Self {
    Self::with_replies(
      counterpart,
      DEFAULT_REPLIES.iter().map(|s| s.to_string()).collect(),
    )
  }

  /// A thread whose simulated replies are drawn from `replies`. An empty list
  /// falls back to [`DEFAULT_REPLIES`].
  pub fn with_replies(counterpart: UserId, replies: Vec<String>) -> Self {
    let replies = if replies.iter().all(|r| r.trim().is_empty()) {
      DEFAULT_REPLIES.iter().map(|s| s.to_string()).collect()
    } else {
      replies.into_iter().filter(|r| !r.trim().is_empty()).collect()
    };
    Self {
      counterpart,
      state: Arc::new(Mutex::new(ThreadState::default())),
      replies,
    }
  }

  pub fn counterpart(&self) -> UserId { self.counterpart }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// A snapshot of the log in chronological order.
  pub fn messages(&self) -> Vec<Message> { lock(&self.state).messages.clone() }

  pub fn len(&self) -> usize { lock(&self.state).messages.len() }

  pub fn is_empty(&self) -> bool { lock(&self.state).messages.is_empty() }

  /// Group by calendar day in the local time zone, relative to now.
  pub fn group_by_date(&self) -> Vec<DateGroup> {
    self.group_by_date_at(&Local::now())
  }

  /// Group by calendar day in `now`'s time zone, labelling relative to `now`.
  pub fn group_by_date_at<Tz: TimeZone>(
    &self,
    now: &DateTime<Tz>,
  ) -> Vec<DateGroup> {
    let tz = now.timezone();
    let today = now.date_naive();
    let state = lock(&self.state);

    let mut groups: Vec<DateGroup> = Vec::new();
    for message in &state.messages {
      let day = message.sent_at.with_timezone(&tz).date_naive();
      match groups.last_mut() {
        Some(group) if group.date == day => group.messages.push(message.clone()),
        _ => groups.push(DateGroup {
          label:    day_label(day, today),
          date:     day,
          messages: vec![message.clone()],
        }),
      }
    }
    groups
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Trim `text` and append it as a new message from `sender_id`.
  pub fn append_outgoing(
    &self,
    text: &str,
    sender_id: UserId,
  ) -> Result<Message, ValidationError> {
    let text = validate_text(text)?;
    let message = lock(&self.state).append(sender_id, text, Utc::now());
    debug!(counterpart = %self.counterpart, id = message.id, "message appended");
    Ok(message)
  }

  /// Insert a message with a known timestamp (history, incoming) at the
  /// position that keeps the log ordered. Ties go after existing messages.
  pub fn insert(
    &self,
    sender_id: UserId,
    text: &str,
    sent_at: DateTime<Utc>,
  ) -> Result<Message, ValidationError> {
    let text = validate_text(text)?;
    Ok(lock(&self.state).insert(sender_id, text, sent_at))
  }

  /// Mark a message as failed to deliver. Returns whether it was found.
  pub fn mark_failed(&self, message_id: u64) -> bool {
    let mut state = lock(&self.state);
    match state.messages.iter_mut().find(|m| m.id == message_id) {
      Some(message) => {
        message.delivery = DeliveryState::Failed;
        true
      }
      None => false,
    }
  }

  // ── Simulated replies ─────────────────────────────────────────────────────

  /// After a delay drawn uniformly from `min..=max`, append a canned reply
  /// from `from`. Must be called within a tokio runtime.
  pub fn schedule_simulated_reply(
    &self,
    from: UserId,
    min: Duration,
    max: Duration,
  ) -> ReplyHandle {
    let mut rng = rand::thread_rng();
    let delay = if max > min { rng.gen_range(min..=max) } else { min };
    let text = self
      .replies
      .choose(&mut rng)
      .cloned()
      .unwrap_or_else(|| DEFAULT_REPLIES[0].to_string());

    let token = CancellationToken::new();
    let task_id = {
      let mut state = lock(&self.state);
      state.pending.retain(|(_, t)| !t.is_cancelled());
      let id = state.next_task;
      state.next_task += 1;
      state.pending.push((id, token.clone()));
      id
    };

    let weak: Weak<Mutex<ThreadState>> = Arc::downgrade(&self.state);
    let cancelled = token.clone();
    let counterpart = self.counterpart;
    debug!(%counterpart, delay_ms = delay.as_millis() as u64, "reply scheduled");

    let task = tokio::spawn(async move {
      tokio::select! {
        biased;
        () = cancelled.cancelled() => {
          debug!(%counterpart, "reply cancelled");
        }
        () = tokio::time::sleep(delay) => {
          let Some(state) = weak.upgrade() else { return };
          let mut state = lock(&state);
          if state.disposed || cancelled.is_cancelled() {
            return;
          }
          state.pending.retain(|(id, _)| *id != task_id);
          let message = state.append(from, text, Utc::now());
          debug!(%counterpart, id = message.id, "reply delivered");
        }
      }
    });

    ReplyHandle { token, task }
  }

  /// Dispose the thread, cancelling every pending reply.
  pub fn dispose(self) { drop(self); }
}

impl Drop for ConversationThread {
  fn drop(&mut self) {
    let mut state = lock(&self.state);
    state.disposed = true;
    for (_, token) in state.pending.drain(..) {
      token.cancel();
    }
    debug!(counterpart = %self.counterpart, "thread disposed");
  }
}
