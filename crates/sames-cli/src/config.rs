//! Layered client settings: defaults, then the TOML file, then `SAMES_*`
//! environment variables (`SAMES_API__BASE_URL`, `SAMES_DECK__LOCK_MS`, ...).
//! Command-line flags are applied on top by `main`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use sames_core::{
  score::ScoringWeights,
  session::DEFAULT_TOKEN_TTL_DAYS,
  thread::{DEFAULT_REPLIES, DEFAULT_REPLY_DELAY},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub api:     ApiSettings,
  pub scoring: ScoringWeights,
  pub deck:    DeckSettings,
  pub chat:    ChatSettings,
  pub session: SessionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
  /// Base URL including the `/api` prefix.
  pub base_url:     String,
  pub timeout_secs: u64,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self {
      base_url:     "http://localhost:5000/api".to_string(),
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckSettings {
  /// How long the deck ignores input after a swipe.
  pub lock_ms: u64,
}

impl Default for DeckSettings {
  fn default() -> Self { Self { lock_ms: 300 } }
}

impl DeckSettings {
  pub fn lock(&self) -> Duration { Duration::from_millis(self.lock_ms) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
  pub reply_delay_min_ms: u64,
  pub reply_delay_max_ms: u64,
  pub canned_replies:     Vec<String>,
}

impl Default for ChatSettings {
  fn default() -> Self {
    Self {
      reply_delay_min_ms: DEFAULT_REPLY_DELAY.start.as_millis() as u64,
      reply_delay_max_ms: DEFAULT_REPLY_DELAY.end.as_millis() as u64,
      canned_replies:     DEFAULT_REPLIES.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl ChatSettings {
  /// The reply window, with the bounds swapped if configured backwards.
  pub fn reply_window(&self) -> (Duration, Duration) {
    let a = Duration::from_millis(self.reply_delay_min_ms);
    let b = Duration::from_millis(self.reply_delay_max_ms);
    (a.min(b), a.max(b))
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
  /// Where `session.json` and `token` live. Defaults to
  /// `$XDG_STATE_HOME/sames` or `~/.local/state/sames`.
  pub state_dir:      Option<PathBuf>,
  pub token_ttl_days: i64,
}

impl Default for SessionSettings {
  fn default() -> Self {
    Self { state_dir: None, token_ttl_days: DEFAULT_TOKEN_TTL_DAYS }
  }
}

impl SessionSettings {
  pub fn resolved_state_dir(&self) -> PathBuf {
    if let Some(dir) = &self.state_dir {
      return expand_tilde(dir);
    }
    if let Ok(state) = std::env::var("XDG_STATE_HOME")
      && !state.is_empty()
    {
      return PathBuf::from(state).join("sames");
    }
    expand_tilde(Path::new("~/.local/state/sames"))
  }
}

impl Settings {
  /// Load settings from `path` (if given and present) and the environment.
  pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
      builder = builder.add_source(config::File::from(path).required(false));
    }
    builder
      .add_source(
        config::Environment::with_prefix("SAMES")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  /// The defaults rendered as TOML, for `sames config`.
  pub fn default_toml() -> anyhow::Result<String> {
    toml::to_string_pretty(&Self::default())
      .context("failed to render default settings")
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sames.toml");
    std::fs::write(
      &path,
      "[deck]\nlock_ms = 50\n\n[scoring]\nlikes = 1.0\nhabits = 0.0\n",
    )
    .unwrap();

    let settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(settings.deck.lock_ms, 50);
    assert_eq!(settings.scoring.likes, 1.0);
    assert_eq!(settings.scoring.habits, 0.0);
    assert_eq!(settings.scoring.traits, ScoringWeights::default().traits);
    assert_eq!(settings.api.timeout_secs, 30);
  }

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(settings.chat.canned_replies.len(), DEFAULT_REPLIES.len());
  }

  #[test]
  fn reply_window_orders_bounds() {
    let chat = ChatSettings {
      reply_delay_min_ms: 3000,
      reply_delay_max_ms: 1000,
      ..ChatSettings::default()
    };
    let (min, max) = chat.reply_window();
    assert!(min <= max);
  }

  #[test]
  fn defaults_render_as_toml() {
    let rendered = Settings::default_toml().unwrap();
    assert!(rendered.contains("[deck]"));
    assert!(rendered.contains("lock_ms = 300"));
  }
}
