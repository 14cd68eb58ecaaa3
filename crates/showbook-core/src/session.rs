//! Browser session metadata and the `SessionProvider` abstraction.
//!
//! The session itself (cookies, browser profile) belongs to the external login
//! flow. Showbook only reads its metadata to decide whether booking automation
//! may run, and to report it on the dashboard.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
  #[serde(default)]
  pub is_valid:   bool,
  pub last_login: Option<DateTime<Utc>>,
  pub user_email: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

impl SessionMetadata {
  /// The view reported when the metadata cannot be read.
  pub fn unknown() -> Self { Self::default() }
}

/// Supplier of the browser authentication context.
pub trait SessionProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the current session metadata.
  fn session_metadata(
    &self,
  ) -> impl Future<Output = Result<SessionMetadata, Self::Error>> + Send + '_;

  /// Whether booking automation may proceed.
  fn is_session_valid(
    &self,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_ {
    async move { Ok(self.session_metadata().await?.is_valid) }
  }
}
