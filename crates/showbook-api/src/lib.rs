//! JSON REST API for showbook.
//!
//! Exposes an axum [`Router`] backed by any [`ShowingStore`] and
//! [`SessionProvider`]. The router only reads the store; writes happen in the
//! fetch stages and the booking executor.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", showbook_api::api_router(state))
//! ```

pub mod error;
pub mod login;
pub mod records;
pub mod scheduler;
pub mod session;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use showbook_core::{session::SessionProvider, store::ShowingStore};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use login::{LoginSupervisor, LoginTask};
pub use scheduler::SchedulerLink;

/// Shared state for every handler.
pub struct AppState<S, P> {
  pub store:     Arc<S>,
  pub session:   Arc<P>,
  pub logins:    LoginSupervisor,
  pub scheduler: SchedulerLink,
}

// Derived `Clone` would demand `S: Clone` and `P: Clone`.
impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      session:   Arc::clone(&self.session),
      logins:    self.logins.clone(),
      scheduler: self.scheduler.clone(),
    }
  }
}

/// Build a fully-materialised API router over `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, P>(state: AppState<S, P>) -> Router<()>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  Router::new()
    // Session
    .route("/session-status", get(session::status::<S, P>))
    .route("/manual-login", post(session::manual_login::<S, P>))
    .route("/logins", get(session::list_logins::<S, P>))
    .route("/logins/{id}", get(session::get_login::<S, P>))
    // Records
    .route("/showing-requests", get(records::list_requests::<S, P>))
    .route("/showing-requests/{id}", get(records::get_request::<S, P>))
    .route("/properties", get(records::list_properties::<S, P>))
    .route("/properties/{id}", get(records::get_property::<S, P>))
    .route("/scheduled-properties", get(records::scheduled::<S, P>))
    .route("/bookings", get(records::list_bookings::<S, P>))
    // Scheduler
    .route("/scheduler-status", get(scheduler::status::<S, P>))
    .route("/fetch-now", post(scheduler::fetch_now::<S, P>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
