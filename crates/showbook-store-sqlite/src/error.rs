//! Error type for `showbook-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] showbook_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("showing request has an empty id")]
  EmptyRequestId,

  #[error("property has an empty id")]
  EmptyPropertyId,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Wrap a decode failure so it can cross a `tokio_rusqlite` closure.
  pub(crate) fn into_db(self) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(self))
  }
}
