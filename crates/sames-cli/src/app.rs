//! Application state machine and event dispatcher.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use sames_core::{
  Error, ValidationError,
  deck::{DeckState, SwipeDeck, SwipeOutcome, Verdict},
  profile::{CandidateCard, User},
  score::CompatibilityScorer,
  thread::ConversationThread,
};
use tracing::{info, warn};

use crate::{client::ApiClient, config::Settings};

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  /// The swipe deck.
  Discover,
  /// A conversation with one candidate.
  Chat,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  pub screen:     Screen,
  pub deck:       SwipeDeck,
  /// Open conversation, if any. Dropping it cancels pending replies.
  pub thread:     Option<ConversationThread>,
  /// Display name of the thread's counterpart.
  pub chat_name:  String,
  /// Chat input buffer.
  pub input:      String,
  /// The logged-in user.
  pub me:         User,
  /// One-line status message shown in the status bar.
  pub status_msg: String,
  pub client:     Arc<ApiClient>,
  scorer:         CompatibilityScorer,
  settings:       Settings,
  /// Session epoch the deck and thread were loaded under.
  epoch:          u64,
}

impl App {
  pub fn new(client: ApiClient, me: User, settings: Settings) -> Self {
    let epoch = client.session().epoch();
    Self {
      screen: Screen::Discover,
      deck: SwipeDeck::new(settings.deck.lock()),
      thread: None,
      chat_name: String::new(),
      input: String::new(),
      me,
      status_msg: String::new(),
      client: Arc::new(client),
      scorer: CompatibilityScorer::new(settings.scoring),
      settings,
      epoch,
    }
  }

  // ── Data loading ──────────────────────────────────────────────────────────

  /// Fetch candidates and replace the deck's queue.
  pub async fn load_deck(&mut self) -> anyhow::Result<()> {
    self.status_msg = "Loading candidates…".into();

    // Without our own attributes the API's score is the best we have.
    let viewer = match self.client.profile().await {
      Ok(record) => Some(record.attributes),
      Err(e) => {
        warn!(error = %e, "own profile unavailable; using reported scores");
        None
      }
    };

    match self.client.discover().await {
      Ok(found) => {
        let cards: Vec<CandidateCard> = found
          .into_iter()
          .map(|c| c.into_card(&self.scorer, viewer.as_ref()))
          .collect();
        info!(count = cards.len(), "deck loaded");
        self.deck.load_queue(cards);
        self.epoch = self.client.session().epoch();
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e.into())
      }
    }
  }

  /// Per-frame housekeeping: settle the deck and drop state that belongs to
  /// a previous session.
  pub fn tick(&mut self) {
    self.deck.settle();

    let epoch = self.client.session().epoch();
    if epoch != self.epoch {
      self.epoch = epoch;
      // The old queue belongs to the previous account; only a reload refills it.
      self.deck.load_queue(Vec::new());
      self.close_chat();
      self.status_msg = "Session changed; press r to reload.".into();
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    match self.screen {
      Screen::Discover => self.handle_discover_key(key).await,
      Screen::Chat => Ok(self.handle_chat_key(key)),
    }
  }

  async fn handle_discover_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Right | KeyCode::Char('l') => self.swipe(Verdict::Like).await,
      KeyCode::Left | KeyCode::Char('h') => self.swipe(Verdict::Dislike).await,

      KeyCode::Enter | KeyCode::Char('c') => self.open_chat(),

      KeyCode::Char('r') => {
        // Failure is already reported in the status bar.
        let _ = self.load_deck().await;
      }

      _ => {}
    }
    Ok(true)
  }

  fn handle_chat_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Esc => self.close_chat(),
      KeyCode::Enter => self.send(),
      KeyCode::Backspace => {
        self.input.pop();
      }
      KeyCode::Char(c) => self.input.push(c),
      _ => {}
    }
    true
  }

  // ── Actions ───────────────────────────────────────────────────────────────

  async fn swipe(&mut self, verdict: Verdict) {
    let name = self
      .deck
      .current()
      .map(|c| c.profile.display_name.clone())
      .unwrap_or_default();

    match self.deck.decide_and_sync(verdict, self.client.as_ref()).await {
      SwipeOutcome::Ignored => {}
      SwipeOutcome::Synced { like: Some(like), .. } if like.is_mutual => {
        self.status_msg = format!("It's a match with {name}! Press Enter to chat.");
      }
      SwipeOutcome::Synced { .. } => {
        self.status_msg = format!("{verdict}d {name}");
      }
      SwipeOutcome::Unsynced { error, .. } => {
        self.status_msg = format!("{verdict}d {name} (not synced: {error})");
      }
    }
  }

  /// Open a chat with the current candidate, or the one just decided on.
  fn open_chat(&mut self) {
    let Some(card) = self.deck.current() else {
      self.status_msg = "Nobody to chat with.".into();
      return;
    };
    let counterpart = card.id();
    self.chat_name = card.profile.display_name.clone();

    if self.thread.as_ref().map(ConversationThread::counterpart) != Some(counterpart) {
      self.thread = Some(ConversationThread::with_replies(
        counterpart,
        self.settings.chat.canned_replies.clone(),
      ));
    }
    self.input.clear();
    self.status_msg = String::new();
    self.screen = Screen::Chat;
  }

  fn close_chat(&mut self) {
    if let Some(thread) = self.thread.take() {
      thread.dispose();
    }
    self.input.clear();
    self.screen = Screen::Discover;
  }

  fn send(&mut self) {
    let Some(thread) = &self.thread else { return };
    match thread.append_outgoing(&self.input, self.me.id) {
      Ok(_) => {
        self.input.clear();
        self.status_msg = String::new();
        let (min, max) = self.settings.chat.reply_window();
        // The thread tracks the reply; dropping it cancels the task.
        let _ = thread.schedule_simulated_reply(thread.counterpart(), min, max);
      }
      Err(ValidationError::EmptyMessage) => {}
      Err(e) => self.status_msg = Error::from(e).to_string(),
    }
  }

  /// Whether the deck currently accepts a swipe.
  pub fn accepting_input(&self) -> bool { self.deck.state() == DeckState::Idle }
}

#[cfg(test)]
pub(crate) mod tests {
  use std::time::Duration;

  use crossterm::event::KeyEventKind;
  use sames_core::{
    profile::{AttributeSets, Profile, UserId},
    session::SessionStore,
  };

  use super::*;
  use crate::client::ApiConfig;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent {
      code,
      modifiers: KeyModifiers::NONE,
      kind: KeyEventKind::Press,
      state: crossterm::event::KeyEventState::NONE,
    }
  }

  fn card(id: i64, name: &str) -> CandidateCard {
    CandidateCard {
      profile:            Profile {
        id:           UserId(id),
        display_name: name.into(),
        age:          Some(28),
        location:     None,
        bio:          None,
        attributes:   AttributeSets::default(),
      },
      match_score:        80,
      mutual_connections: 2,
    }
  }

  pub(crate) fn app() -> App {
    let client = ApiClient::new(
      ApiConfig {
        base_url: "http://127.0.0.1:9/api".into(),
        timeout:  Duration::from_secs(1),
      },
      SessionStore::in_memory(),
    )
    .unwrap();
    let me = User {
      id:                    UserId(1),
      username:              "sarah".into(),
      email:                 "sarah@example.com".into(),
      has_completed_profile: true,
      is_premium:            false,
    };
    let mut settings = Settings::default();
    settings.chat.reply_delay_min_ms = 1000;
    settings.chat.reply_delay_max_ms = 1000;
    settings.chat.canned_replies = vec!["See you there!".into()];
    let mut app = App::new(client, me, settings);
    app.deck.load_queue(vec![card(2, "Alex"), card(3, "Sam")]);
    app
  }

  #[tokio::test(start_paused = true)]
  async fn swipe_without_session_stays_local() {
    let mut app = app();
    assert!(app.handle_key(key(KeyCode::Char('l'))).await.unwrap());
    assert_eq!(app.deck.decisions().len(), 1);
    assert!(app.status_msg.contains("not synced"));

    // Locked: a second swipe is dropped.
    app.handle_key(key(KeyCode::Char('h'))).await.unwrap();
    assert_eq!(app.deck.decisions().len(), 1);

    tokio::time::advance(Duration::from_millis(400)).await;
    app.tick();
    assert_eq!(app.deck.current().map(|c| c.id()), Some(UserId(3)));
  }

  #[tokio::test(start_paused = true)]
  async fn chat_send_then_reply() {
    let mut app = app();
    app.handle_key(key(KeyCode::Enter)).await.unwrap();
    assert_eq!(app.screen, Screen::Chat);

    for c in "hi there".chars() {
      app.handle_key(key(KeyCode::Char(c))).await.unwrap();
    }
    app.handle_key(key(KeyCode::Enter)).await.unwrap();
    assert!(app.input.is_empty());

    let thread = app.thread.as_ref().unwrap();
    assert_eq!(thread.len(), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let messages = thread.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].sender_id, UserId(2));
    assert_eq!(messages[1].text, "See you there!");
  }

  #[tokio::test]
  async fn blank_message_is_not_sent() {
    let mut app = app();
    app.handle_key(key(KeyCode::Char('c'))).await.unwrap();
    app.handle_key(key(KeyCode::Char(' '))).await.unwrap();
    app.handle_key(key(KeyCode::Enter)).await.unwrap();
    assert!(app.thread.as_ref().unwrap().is_empty());
  }

  #[tokio::test]
  async fn leaving_chat_disposes_thread() {
    let mut app = app();
    app.handle_key(key(KeyCode::Enter)).await.unwrap();
    app.handle_key(key(KeyCode::Esc)).await.unwrap();
    assert_eq!(app.screen, Screen::Discover);
    assert!(app.thread.is_none());
  }

  #[tokio::test]
  async fn session_change_empties_deck() {
    let mut app = app();
    let session = app.client.session().clone();
    session.set_token(Some("tok".into())).unwrap();
    session.set_user(app.me.clone()).unwrap();
    app.tick();
    app.deck.load_queue(vec![card(2, "Alex"), card(3, "Sam")]);
    app.handle_key(key(KeyCode::Enter)).await.unwrap();
    assert_eq!(app.screen, Screen::Chat);

    session.logout().unwrap();
    app.tick();

    assert_eq!(app.screen, Screen::Discover);
    assert!(app.thread.is_none());
    assert!(app.deck.current().is_none());
    assert_eq!(app.deck.state(), DeckState::Exhausted);
    assert!(!app.deck.decide(Verdict::Like));
  }

  #[tokio::test]
  async fn quit_keys() {
    let mut app = app();
    assert!(!app.handle_key(key(KeyCode::Char('q'))).await.unwrap());
    let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
    assert!(!app.handle_key(ctrl_c).await.unwrap());
  }
}
