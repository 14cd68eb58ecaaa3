//! Handlers for the scheduler endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/scheduler-status` | Latest [`SchedulerSnapshot`] |
//! | `POST` | `/fetch-now` | Queue an immediate fetch cycle; 202 |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use showbook_core::{
  schedule::{SchedulerCommand, SchedulerSnapshot},
  session::SessionProvider,
  store::ShowingStore,
};
use tokio::sync::{mpsc, watch};

use crate::{AppState, error::ApiError};

/// The API's view of the scheduler: a snapshot receiver and a command
/// sender. The scheduler's control loop owns the other ends.
#[derive(Clone)]
pub struct SchedulerLink {
  status:   watch::Receiver<SchedulerSnapshot>,
  commands: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerLink {
  pub fn new(
    status: watch::Receiver<SchedulerSnapshot>,
    commands: mpsc::Sender<SchedulerCommand>,
  ) -> Self {
    Self { status, commands }
  }

  /// A link to no scheduler: reports `disabled` and rejects commands.
  pub fn detached() -> Self {
    let (_, status) = watch::channel(SchedulerSnapshot::disabled());
    let (commands, _) = mpsc::channel(1);
    Self { status, commands }
  }

  pub fn snapshot(&self) -> SchedulerSnapshot { self.status.borrow().clone() }

  pub fn send(&self, command: SchedulerCommand) -> Result<(), ApiError> {
    match self.commands.try_send(command) {
      // A full queue already holds a pending trigger.
      Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
      Err(mpsc::error::TrySendError::Closed(_)) => {
        Err(ApiError::Unavailable("scheduler is not running".into()))
      }
    }
  }
}

/// `GET /scheduler-status`
pub async fn status<S, P>(State(state): State<AppState<S, P>>) -> Json<SchedulerSnapshot>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  Json(state.scheduler.snapshot())
}

/// `POST /fetch-now`
pub async fn fetch_now<S, P>(
  State(state): State<AppState<S, P>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  state.scheduler.send(SchedulerCommand::RunNow)?;
  tracing::info!("immediate fetch cycle requested");
  Ok((StatusCode::ACCEPTED, Json(json!({ "success": true }))))
}
