//! `sames` — terminal client for the Sames dating service.
//!
//! # Usage
//!
//! ```text
//! sames login --email sarah@example.com
//! sames tui
//! sames --config ~/.config/sames/config.toml matches
//! ```

mod app;
mod client;
mod config;
mod storage;
mod ui;

use std::{
  fs::OpenOptions,
  io,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::Duration,
};

use anyhow::{Context, Result, bail};
use app::App;
use clap::{Args, Parser, Subcommand};
use client::{ApiClient, ApiConfig, NewProfile};
use config::Settings;
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use sames_core::{
  gateway::{Credentials, Registration},
  session::SessionStore,
};
use storage::FileSessionStorage;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sames", version, about = "Terminal client for Sames")]
struct Cli {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE", env = "SAMES_CONFIG")]
  config: Option<PathBuf>,

  /// Base URL of the API, including the `/api` prefix.
  #[arg(long, value_name = "URL")]
  api_url: Option<String>,

  /// Directory holding the persisted session.
  #[arg(long, value_name = "DIR")]
  state_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sign in and persist the session.
  Login {
    /// Email address or username.
    #[arg(short, long)]
    email:    String,
    #[arg(long, env = "SAMES_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// Create an account and sign in.
  Register {
    #[arg(short, long)]
    username:         String,
    #[arg(short, long)]
    email:            String,
    #[arg(long, env = "SAMES_PASSWORD", hide_env_values = true)]
    password:         String,
    #[arg(long)]
    confirm_password: String,
  },
  /// Forget the persisted session.
  Logout,
  /// Show the signed-in account.
  Whoami,
  /// Show the own profile, or create it when any field is given.
  Profile(ProfileArgs),
  /// List confirmed matches.
  Matches,
  /// Swipe and chat interactively (the default).
  Tui,
  /// Print the default configuration as TOML.
  Config,
}

#[derive(Args, Debug)]
struct ProfileArgs {
  #[arg(long)]
  age:      Option<u32>,
  #[arg(long)]
  location: Option<String>,
  #[arg(long)]
  bio:      Option<String>,
  #[arg(long, value_delimiter = ',')]
  traits:   Vec<String>,
  #[arg(long, value_delimiter = ',')]
  likes:    Vec<String>,
  #[arg(long, value_delimiter = ',')]
  dislikes: Vec<String>,
  #[arg(long, value_delimiter = ',')]
  fears:    Vec<String>,
  #[arg(long, value_delimiter = ',')]
  habits:   Vec<String>,
  /// Hide the profile from discovery.
  #[arg(long)]
  private:  bool,
}

impl ProfileArgs {
  fn is_empty(&self) -> bool {
    self.age.is_none()
      && self.location.is_none()
      && self.bio.is_none()
      && self.traits.is_empty()
      && self.likes.is_empty()
      && self.dislikes.is_empty()
      && self.fears.is_empty()
      && self.habits.is_empty()
      && !self.private
  }

  fn into_new_profile(self) -> NewProfile {
    NewProfile {
      age:                self.age,
      location:           self.location,
      bio:                self.bio,
      personality_traits: self.traits.into_iter().collect(),
      likes:              self.likes.into_iter().collect(),
      dislikes:           self.dislikes.into_iter().collect(),
      fears:              self.fears.into_iter().collect(),
      habits:             self.habits.into_iter().collect(),
      is_private:         self.private,
      allow_matching:     !self.private,
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let config_path = cli.config.clone().or_else(default_config_path);
  let mut settings = Settings::load(config_path.as_deref())?;
  if let Some(url) = cli.api_url {
    settings.api.base_url = url;
  }
  if let Some(dir) = cli.state_dir {
    settings.session.state_dir = Some(dir);
  }

  let command = cli.command.unwrap_or(Command::Tui);
  if let Command::Config = command {
    print!("{}", Settings::default_toml()?);
    return Ok(());
  }

  let state_dir = settings.session.resolved_state_dir();
  init_tracing(&command, &state_dir)?;

  let session = SessionStore::new(
    Arc::new(FileSessionStorage::new(&state_dir)),
    chrono::Duration::days(settings.session.token_ttl_days),
  );
  session.restore().context("restoring session")?;

  let client = ApiClient::new(
    ApiConfig {
      base_url: settings.api.base_url.clone(),
      timeout:  Duration::from_secs(settings.api.timeout_secs),
    },
    session.clone(),
  )?;

  match command {
    Command::Login { email, password } => {
      let session = session
        .login(&client, &Credentials { email, password })
        .await
        .context("login failed")?;
      println!("Signed in as user {}.", session.user_id);
    }
    Command::Register { username, email, password, confirm_password } => {
      let registration = Registration { username, email, password, confirm_password };
      let session = session
        .register(&client, &registration)
        .await
        .context("registration failed")?;
      println!("Account created; signed in as user {}.", session.user_id);
    }
    Command::Logout => {
      session.logout().context("clearing session")?;
      println!("Signed out.");
    }
    Command::Whoami => {
      let user = client.me().await.context("fetching account")?;
      session.set_user(user.clone())?;
      println!("{} <{}> (id {})", user.username, user.email, user.id);
      if !user.has_completed_profile {
        println!("Profile not set up yet; see `sames profile --help`.");
      }
    }
    Command::Profile(args) => run_profile(&client, &session, args).await?,
    Command::Matches => {
      let matches = client.matches().await.context("fetching matches")?;
      if matches.is_empty() {
        println!("No matches yet.");
      }
      for m in matches {
        let age = m.user.age.map(|a| a.to_string()).unwrap_or_default();
        println!(
          "#{:<5} {:<20} {:>3} {:>3.0}%  {}  {}",
          m.match_id,
          format!("{} ({})", m.user.username, m.user.id),
          age,
          m.match_score,
          m.user.location.unwrap_or_default(),
          m.matched_at.unwrap_or_default(),
        );
        if let Some(bio) = m.user.bio {
          println!("       {bio}");
        }
      }
    }
    Command::Tui => run_tui(client, &session, settings).await?,
    // Printed before the session is opened.
    Command::Config => {}
  }

  Ok(())
}

async fn run_profile(
  client: &ApiClient,
  session: &SessionStore,
  args: ProfileArgs,
) -> Result<()> {
  let record = if args.is_empty() {
    client.profile().await.context("fetching profile")?
  } else {
    client
      .create_profile(&args.into_new_profile())
      .await
      .context("saving profile")?
  };

  let visibility = match (record.is_private, record.allow_matching) {
    (true, _) => "private",
    (false, false) => "public, hidden from discovery",
    (false, true) => "public",
  };
  let name = session.current_user().map(|u| u.username).unwrap_or_default();
  let profile = record.into_profile(name);
  session.set_profile(profile.clone())?;

  println!("{}", serde_json::to_string_pretty(&profile)?);
  println!("Visibility: {visibility}");
  Ok(())
}

// ─── Logging ──────────────────────────────────────────────────────────────────

/// Log to stderr, or to `sames.log` in the state directory while the TUI owns
/// the terminal.
fn init_tracing(command: &Command, state_dir: &Path) -> Result<()> {
  let filter = |default: LevelFilter| {
    EnvFilter::builder()
      .with_default_directive(default.into())
      .from_env_lossy()
  };

  if let Command::Tui = command {
    std::fs::create_dir_all(state_dir)
      .with_context(|| format!("creating {}", state_dir.display()))?;
    let path = state_dir.join("sames.log");
    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .with_context(|| format!("opening log file {}", path.display()))?;
    tracing_subscriber::fmt()
      .with_env_filter(filter(LevelFilter::INFO))
      .with_ansi(false)
      .with_writer(Mutex::new(file))
      .init();
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(filter(LevelFilter::WARN))
      .with_writer(io::stderr)
      .init();
  }
  Ok(())
}

fn default_config_path() -> Option<PathBuf> {
  let base = std::env::var_os("XDG_CONFIG_HOME")
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
    .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
  Some(base.join("sames").join("config.toml"))
}

// ─── TUI ──────────────────────────────────────────────────────────────────────

async fn run_tui(client: ApiClient, session: &SessionStore, settings: Settings) -> Result<()> {
  session
    .require_token()
    .context("not signed in; run `sames login` first")?;
  let Some(me) = session.current_user() else {
    bail!("no account cached; run `sames login` first");
  };

  let mut app = App::new(client, me, settings);
  // A failed load leaves an empty deck; the status bar shows why.
  let _ = app.load_deck().await;

  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let run_result = run_event_loop(&mut terminal, &mut app).await;

  // Restore the terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
) -> Result<()> {
  loop {
    app.tick();
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event
      && !app.handle_key(key).await?
    {
      break;
    }
  }

  Ok(())
}
