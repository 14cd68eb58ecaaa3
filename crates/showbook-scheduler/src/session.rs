//! Session metadata read from the file the external login flow writes.

use std::{io::ErrorKind, path::PathBuf};

use chrono::{Duration, Utc};
use showbook_core::session::{SessionMetadata, SessionProvider};

use crate::{Error, Result};

/// Reads `SessionMetadata` JSON from disk on every call.
///
/// A missing file means nobody has logged in yet: the session is invalid, but
/// that is not an error.
#[derive(Debug, Clone)]
pub struct FileSessionProvider {
  path:    PathBuf,
  max_age: Option<Duration>,
}

impl FileSessionProvider {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), max_age: None }
  }

  /// Treat logins older than `max_age_hours` as expired. Ages too large to
  /// represent never expire.
  pub fn with_max_age_hours(mut self, max_age_hours: Option<u64>) -> Self {
    self.max_age = max_age_hours
      .and_then(|h| i64::try_from(h).ok())
      .and_then(Duration::try_hours);
    self
  }
}

impl SessionProvider for FileSessionProvider {
  type Error = Error;

  async fn session_metadata(&self) -> Result<SessionMetadata> {
    let bytes = match tokio::fs::read(&self.path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        tracing::debug!(path = %self.path.display(), "no session metadata file");
        return Ok(SessionMetadata::unknown());
      }
      Err(e) => return Err(e.into()),
    };

    let mut meta: SessionMetadata = serde_json::from_slice(&bytes)?;
    if let (Some(max_age), Some(last_login)) = (self.max_age, meta.last_login)
      && Utc::now() - last_login > max_age
    {
      meta.is_valid = false;
    }
    Ok(meta)
  }
}
