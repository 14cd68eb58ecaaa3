//! Supervised interactive-login processes.
//!
//! `POST /api/manual-login` must return immediately, so the login flow runs
//! detached from the request. Each process is still tracked: it is registered
//! on spawn with its pid, and a reaper task records how it ended.

use std::{collections::VecDeque, process::Stdio, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use showbook_core::command::CommandSpec;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ApiError;

/// Finished tasks beyond this count are forgotten, oldest first.
const MAX_TASKS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginStatus {
  Running,
  Exited { code: Option<i32> },
  Failed { error: String },
}

/// Observable handle for one login process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginTask {
  pub id:          Uuid,
  pub pid:         Option<u32>,
  pub command:     String,
  pub status:      LoginStatus,
  pub started_at:  DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
}

impl LoginTask {
  pub fn is_running(&self) -> bool { self.status == LoginStatus::Running }
}

/// Spawns login processes and keeps a bounded registry of their handles.
///
/// Cloning is cheap; clones share the registry.
#[derive(Clone)]
pub struct LoginSupervisor {
  command: Option<CommandSpec>,
  tasks:   Arc<Mutex<VecDeque<LoginTask>>>,
}

impl LoginSupervisor {
  /// `command` is `None` when no login flow is configured; every spawn then
  /// fails with [`ApiError::Spawn`].
  pub fn new(command: Option<CommandSpec>) -> Self {
    Self { command, tasks: Arc::default() }
  }

  /// Start the login flow and return as soon as the process exists.
  pub async fn spawn(&self) -> Result<LoginTask, ApiError> {
    let spec = self
      .command
      .as_ref()
      .ok_or_else(|| ApiError::Spawn("no login command configured".into()))?;

    let mut child = tokio::process::Command::new(&spec.program)
      .args(&spec.args)
      .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
      .stdin(Stdio::null())
      .spawn()
      .map_err(|e| ApiError::Spawn(format!("{spec}: {e}")))?;

    let task = LoginTask {
      id:          Uuid::new_v4(),
      pid:         child.id(),
      command:     spec.to_string(),
      status:      LoginStatus::Running,
      started_at:  Utc::now(),
      finished_at: None,
    };
    tracing::info!(task = %task.id, pid = ?task.pid, command = %task.command, "login process started");
    self.register(task.clone()).await;

    let tasks = Arc::clone(&self.tasks);
    let id = task.id;
    let timeout = spec.timeout;
    tokio::spawn(async move {
      let waited = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
          Ok(result) => result.map_err(|e| e.to_string()),
          Err(_) => {
            if let Err(e) = child.kill().await {
              tracing::warn!(task = %id, error = %e, "failed to kill timed-out login process");
            }
            Err(format!("timed out after {}s", limit.as_secs()))
          }
        },
        None => child.wait().await.map_err(|e| e.to_string()),
      };

      let status = match waited {
        Ok(exit) => {
          tracing::info!(task = %id, code = ?exit.code(), "login process exited");
          LoginStatus::Exited { code: exit.code() }
        }
        Err(error) => {
          tracing::warn!(task = %id, %error, "login process failed");
          LoginStatus::Failed { error }
        }
      };

      let mut tasks = tasks.lock().await;
      if let Some(entry) = tasks.iter_mut().find(|t| t.id == id) {
        entry.status = status;
        entry.finished_at = Some(Utc::now());
      }
    });

    Ok(task)
  }

  async fn register(&self, task: LoginTask) {
    let mut tasks = self.tasks.lock().await;
    tasks.push_back(task);
    while tasks.len() > MAX_TASKS {
      match tasks.iter().position(|t| !t.is_running()) {
        Some(pos) => {
          tasks.remove(pos);
        }
        None => break,
      }
    }
  }

  /// All tracked tasks, newest first.
  pub async fn list(&self) -> Vec<LoginTask> {
    self.tasks.lock().await.iter().rev().cloned().collect()
  }

  pub async fn get(&self, id: Uuid) -> Option<LoginTask> {
    self.tasks.lock().await.iter().find(|t| t.id == id).cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
  }

  async fn wait_finished(sup: &LoginSupervisor, id: Uuid) -> LoginTask {
    for _ in 0..200 {
      let task = sup.get(id).await.expect("registered task");
      if !task.is_running() {
        return task;
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("login task {id} never finished");
  }

  #[tokio::test]
  async fn spawn_registers_and_reaps() {
    let sup = LoginSupervisor::new(Some(sh("exit 3")));
    let task = sup.spawn().await.unwrap();
    assert!(task.pid.is_some());
    assert_eq!(task.status, LoginStatus::Running);

    let done = wait_finished(&sup, task.id).await;
    assert_eq!(done.status, LoginStatus::Exited { code: Some(3) });
    assert!(done.finished_at.is_some());
  }

  #[tokio::test]
  async fn missing_command_is_a_spawn_error() {
    let sup = LoginSupervisor::new(None);
    assert!(matches!(sup.spawn().await, Err(ApiError::Spawn(_))));
  }

  #[tokio::test]
  async fn missing_executable_is_a_spawn_error() {
    let sup = LoginSupervisor::new(Some(CommandSpec::new("/nonexistent/showbook-login")));
    let err = sup.spawn().await.unwrap_err();
    assert!(err.to_string().contains("/nonexistent/showbook-login"));
    assert!(sup.list().await.is_empty());
  }

  #[tokio::test]
  async fn timed_out_login_is_killed() {
    let sup = LoginSupervisor::new(Some(sh("sleep 30").timeout(Duration::from_millis(100))));
    let task = sup.spawn().await.unwrap();
    let done = wait_finished(&sup, task.id).await;
    assert!(matches!(done.status, LoginStatus::Failed { .. }));
  }

  #[tokio::test]
  async fn registry_is_bounded() {
    let sup = LoginSupervisor::new(Some(sh("exit 0")));
    let mut last = None;
    for _ in 0..(MAX_TASKS + 5) {
      let task = sup.spawn().await.unwrap();
      wait_finished(&sup, task.id).await;
      last = Some(task.id);
    }
    let tasks = sup.list().await;
    assert_eq!(tasks.len(), MAX_TASKS);
    assert_eq!(tasks.first().map(|t| t.id), last);
  }
}
