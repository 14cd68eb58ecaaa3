//! Error types for `showbook-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown request status: {0:?}")]
  UnknownRequestStatus(String),

  #[error("unknown booking status: {0:?}")]
  UnknownBookingStatus(String),

  #[error("invalid date: {0:?}")]
  InvalidDate(String),

  #[error("invalid time: {0:?}")]
  InvalidTime(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
