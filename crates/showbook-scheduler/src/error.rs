//! Error type for the scheduler crate.

use showbook_core::schedule::Stage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("{0} is not configured")]
  NotConfigured(&'static str),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("session error: {0}")]
  Session(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Core(#[from] showbook_core::Error),

  #[error("browser session is not valid; run the login flow first")]
  SessionInvalid,

  #[error("showing request {0} not found")]
  RequestNotFound(String),

  #[error("showing request {0} is already booked")]
  AlreadyBooked(String),

  #[error("property {0} has no known address")]
  AddressUnknown(String),

  #[error("no viewing slot available")]
  NoSlot,

  #[error("stage {stage} failed for {failures} item(s)")]
  StageFailed { stage: Stage, failures: usize },
}

impl Error {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }

  pub fn session<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Session(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
