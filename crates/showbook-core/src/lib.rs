//! Core types and trait definitions for showbook.
//!
//! This crate is deliberately free of HTTP, process and database dependencies.
//! The store, API and scheduler crates all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod address;
pub mod booking;
pub mod command;
pub mod error;
pub mod property;
pub mod request;
pub mod schedule;
pub mod session;
pub mod slot;
pub mod store;

pub use error::{Error, Result};
