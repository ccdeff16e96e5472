//! File-backed [`SessionStorage`]: `session.json` and `token` in one
//! directory.

use std::{
  fs,
  io::{self, Write as _},
  path::PathBuf,
};

use sames_core::{
  Result,
  storage::{SessionBlob, SessionStorage},
};

const BLOB_FILE: &str = "session.json";
const TOKEN_FILE: &str = "token";

#[derive(Debug, Clone)]
pub struct FileSessionStorage {
  dir: PathBuf,
}

impl FileSessionStorage {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

  fn read_optional(&self, name: &str) -> io::Result<Option<String>> {
    match fs::read_to_string(self.dir.join(name)) {
      Ok(contents) => Ok(Some(contents)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// Write via a temporary sibling and rename, so a crash never leaves a
  /// half-written entry.
  fn write_atomic(&self, name: &str, contents: &[u8]) -> io::Result<()> {
    fs::create_dir_all(&self.dir)?;
    let target = self.dir.join(name);
    let tmp = self.dir.join(format!(".{name}.tmp"));
    {
      let mut file = fs::File::create(&tmp)?;
      file.write_all(contents)?;
      file.sync_all()?;
    }
    fs::rename(&tmp, &target)
  }

  fn remove(&self, name: &str) -> io::Result<()> {
    match fs::remove_file(self.dir.join(name)) {
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      other => other,
    }
  }
}

impl SessionStorage for FileSessionStorage {
  fn load_blob(&self) -> Result<Option<SessionBlob>> {
    match self.read_optional(BLOB_FILE)? {
      Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
      None => Ok(None),
    }
  }

  fn save_blob(&self, blob: &SessionBlob) -> Result<()> {
    let raw = serde_json::to_vec_pretty(blob)?;
    Ok(self.write_atomic(BLOB_FILE, &raw)?)
  }

  fn load_token(&self) -> Result<Option<String>> {
    Ok(
      self
        .read_optional(TOKEN_FILE)?
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty()),
    )
  }

  fn save_token(&self, token: Option<&str>) -> Result<()> {
    match token {
      Some(token) => Ok(self.write_atomic(TOKEN_FILE, token.as_bytes())?),
      None => Ok(self.remove(TOKEN_FILE)?),
    }
  }

  fn clear(&self) -> Result<()> {
    self.remove(BLOB_FILE)?;
    self.remove(TOKEN_FILE)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use sames_core::profile::{User, UserId};

  use super::*;

  fn blob() -> SessionBlob {
    SessionBlob {
      user:       User {
        id:                    UserId(3),
        username:              "sarah".into(),
        email:                 "sarah@example.com".into(),
        has_completed_profile: false,
        is_premium:            false,
      },
      expires_at: None,
      profile:    None,
    }
  }

  #[test]
  fn entries_persist_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileSessionStorage::new(dir.path().join("state"));
    storage.save_blob(&blob()).unwrap();
    storage.save_token(Some("abc")).unwrap();

    let reopened = FileSessionStorage::new(dir.path().join("state"));
    assert_eq!(reopened.load_blob().unwrap(), Some(blob()));
    assert_eq!(reopened.load_token().unwrap().as_deref(), Some("abc"));
  }

  #[test]
  fn clear_removes_both_entries_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileSessionStorage::new(dir.path());
    storage.save_blob(&blob()).unwrap();
    storage.save_token(Some("abc")).unwrap();

    storage.clear().unwrap();
    storage.clear().unwrap();
    assert!(storage.load_blob().unwrap().is_none());
    assert!(storage.load_token().unwrap().is_none());
    assert!(!dir.path().join(BLOB_FILE).exists());
  }

  #[test]
  fn empty_directory_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileSessionStorage::new(dir.path().join("never-created"));
    assert!(storage.load_blob().unwrap().is_none());
    assert!(storage.load_token().unwrap().is_none());
  }
}
