//! The showbook service: fetch-cycle orchestration, the two fetch stages,
//! booking and session access.
//!
//! The `showbookd` binary wires these to the SQLite store and the HTTP API.

pub mod booking;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod session;
pub mod stages;

pub use config::ServiceConfig;
pub use error::{Error, Result};
