//! Handlers for the session endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/session-status` | Always `200 {success:true, session:{…}}` |
//! | `POST` | `/manual-login` | Starts the login flow; returns its pid without waiting |
//! | `GET`  | `/logins` | Supervised login tasks, newest first |
//! | `GET`  | `/logins/{id}` | One login task; 404 if unknown |

use axum::{
  Json,
  extract::{Path, State},
};
use serde_json::{Value, json};
use showbook_core::{
  session::{SessionMetadata, SessionProvider},
  store::ShowingStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, login::LoginTask};

/// `GET /session-status`
///
/// A provider failure is reported as an invalid session, never as an HTTP
/// error: the dashboard must always get a well-formed answer.
pub async fn status<S, P>(State(state): State<AppState<S, P>>) -> Json<Value>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  let session = match state.session.session_metadata().await {
    Ok(meta) => meta,
    Err(e) => {
      tracing::warn!(error = %e, "session metadata unavailable; reporting invalid session");
      SessionMetadata::unknown()
    }
  };

  Json(json!({ "success": true, "session": session }))
}

/// `POST /manual-login`
pub async fn manual_login<S, P>(
  State(state): State<AppState<S, P>>,
) -> Result<Json<Value>, ApiError>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  let task = state.logins.spawn().await?;
  Ok(Json(json!({
    "success": true,
    "message": "Login process started",
    "pid":     task.pid,
    "taskId":  task.id,
  })))
}

/// `GET /logins`
pub async fn list_logins<S, P>(State(state): State<AppState<S, P>>) -> Json<Vec<LoginTask>>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  Json(state.logins.list().await)
}

/// `GET /logins/{id}`
pub async fn get_login<S, P>(
  State(state): State<AppState<S, P>>,
  Path(id): Path<Uuid>,
) -> Result<Json<LoginTask>, ApiError>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  state
    .logins
    .get(id)
    .await
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("login task {id} not found")))
}
