//! Types shared between the scheduler's control loop and its observers.
//!
//! The control loop is the single writer of scheduler state. Everything else
//! reads a [`SchedulerSnapshot`] and talks back through [`SchedulerCommand`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the two fetch stages.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
  /// Stage A: pull new showing requests into the store.
  RequestSync,
  /// Stage B: resolve property addresses for received requests.
  AddressResolve,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CycleOutcome {
  /// Both stages exited zero.
  Success,
  /// At least one stage failed.
  Degraded,
  /// Shutdown arrived before the second stage started.
  Interrupted,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SchedulerPhase {
  /// `ENABLE_AUTO_FETCH` is off; no cycles will ever run.
  Disabled,
  Idle,
  Running,
  ShuttingDown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
  pub stage:       Stage,
  pub success:     bool,
  pub exit_code:   Option<i32>,
  pub elapsed_ms:  u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
  pub cycle:       u64,
  pub outcome:     CycleOutcome,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub stages:      Vec<StageSummary>,
}

/// Read-only copy of scheduler state, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
  pub phase:                SchedulerPhase,
  pub interval_secs:        u64,
  pub retry_delay_secs:     u64,
  pub cycles_run:           u64,
  pub consecutive_degraded: u32,
  pub next_run_at:          Option<DateTime<Utc>>,
  pub last_cycle:           Option<CycleSummary>,
}

impl SchedulerSnapshot {
  pub fn disabled() -> Self {
    Self {
      phase:                SchedulerPhase::Disabled,
      interval_secs:        0,
      retry_delay_secs:     0,
      cycles_run:           0,
      consecutive_degraded: 0,
      next_run_at:          None,
      last_cycle:           None,
    }
  }
}

/// Messages accepted by the scheduler's control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
  /// Make the schedule due now; the cycle starts on the next tick.
  RunNow,
}
