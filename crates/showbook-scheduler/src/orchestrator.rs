//! The fetch-cycle control loop.
//!
//! One [`Orchestrator`] owns the [`SchedulerState`] and is its only writer.
//! Observers read a [`SchedulerSnapshot`] from a `watch` channel and send
//! [`SchedulerCommand`]s through a bounded queue; both ends are bundled in the
//! [`SchedulerLink`] handed to the API.
//!
//! A cycle runs Stage A (request sync), waits `inter_stage_delay`, then runs
//! Stage B (address resolve) whatever Stage A's result was. The next cycle is
//! due `interval` after a successful cycle and [`RETRY_DELAY`] after a
//! degraded one. Cycles never overlap.

use std::{future::Future, path::Path, sync::Arc, time::Duration};

use chrono::Utc;
use showbook_api::SchedulerLink;
use showbook_core::{
  command::CommandSpec,
  schedule::{
    CycleOutcome, CycleSummary, SchedulerCommand, SchedulerPhase, SchedulerSnapshot, Stage,
    StageSummary,
  },
};
use tokio::{
  sync::{mpsc, watch},
  time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
  config::ServiceConfig,
  runner::{StageResult, StageRunner},
};

/// Delay before the next cycle after a degraded one. Fixed, no backoff.
pub const RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

/// Upper bound on any delay between cycles.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

// ─── Policy ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePolicy {
  /// Delay after a successful cycle.
  pub interval:          Duration,
  /// Delay after a degraded cycle.
  pub retry_delay:       Duration,
  /// How often the loop wakes to check whether a cycle is due.
  pub tick:              Duration,
  /// Pause between Stage A and Stage B.
  pub inter_stage_delay: Duration,
}

impl SchedulePolicy {
  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      retry_delay: RETRY_DELAY,
      tick: Duration::from_secs(30),
      inter_stage_delay: Duration::from_secs(10),
    }
  }

  pub fn from_config(cfg: &ServiceConfig) -> Self {
    Self {
      interval:          cfg.fetch_interval(),
      retry_delay:       RETRY_DELAY,
      tick:              cfg.poll_tick(),
      inter_stage_delay: cfg.inter_stage_delay(),
    }
  }

  fn delay_after(&self, outcome: CycleOutcome) -> Duration {
    let delay = match outcome {
      CycleOutcome::Success => self.interval,
      CycleOutcome::Degraded | CycleOutcome::Interrupted => self.retry_delay,
    };
    delay.min(MAX_INTERVAL)
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Idle,
  Running { cycle: u64 },
  ShuttingDown,
}

/// Scheduler state, owned by the control loop.
#[derive(Debug, Clone)]
pub struct SchedulerState {
  pub phase:                Phase,
  pub next_run_at:          Instant,
  pub cycles_run:           u64,
  pub consecutive_degraded: u32,
  pub last_cycle:           Option<CycleSummary>,
}

impl SchedulerState {
  /// Idle, with the first cycle due immediately.
  pub fn new(now: Instant) -> Self {
    Self {
      phase:                Phase::Idle,
      next_run_at:          now,
      cycles_run:           0,
      consecutive_degraded: 0,
      last_cycle:           None,
    }
  }

  pub fn is_due(&self, now: Instant) -> bool {
    self.phase == Phase::Idle && now >= self.next_run_at
  }

  /// Record a finished cycle and schedule the next one from `completed_at`.
  pub fn complete(&mut self, summary: CycleSummary, completed_at: Instant, policy: &SchedulePolicy) {
    self.cycles_run += 1;
    match summary.outcome {
      CycleOutcome::Success => self.consecutive_degraded = 0,
      CycleOutcome::Degraded => self.consecutive_degraded += 1,
      CycleOutcome::Interrupted => {}
    }
    self.next_run_at = completed_at + policy.delay_after(summary.outcome);
    self.last_cycle = Some(summary);
    self.phase = Phase::Idle;
  }

  pub fn snapshot(&self, policy: &SchedulePolicy, now: Instant) -> SchedulerSnapshot {
    let phase = match self.phase {
      Phase::Idle => SchedulerPhase::Idle,
      Phase::Running { .. } => SchedulerPhase::Running,
      Phase::ShuttingDown => SchedulerPhase::ShuttingDown,
    };
    let next_run_at = (self.phase != Phase::ShuttingDown)
      .then(|| chrono::Duration::from_std(self.next_run_at.saturating_duration_since(now)).ok())
      .flatten()
      .map(|wait| Utc::now() + wait);

    SchedulerSnapshot {
      phase,
      interval_secs: policy.interval.as_secs(),
      retry_delay_secs: policy.retry_delay.as_secs(),
      cycles_run: self.cycles_run,
      consecutive_degraded: self.consecutive_degraded,
      next_run_at,
      last_cycle: self.last_cycle.clone(),
    }
  }
}

// ─── Launching ───────────────────────────────────────────────────────────────

/// Starts one stage and waits for it. Implementations never fail: every error
/// is a failed [`StageResult`].
pub trait StageLauncher: Send + Sync + 'static {
  fn launch(&self, stage: Stage) -> impl Future<Output = StageResult> + Send + '_;
}

/// Launches stages as child processes through a [`StageRunner`].
#[derive(Debug, Clone)]
pub struct ProcessStageLauncher {
  runner:  StageRunner,
  sync:    CommandSpec,
  resolve: CommandSpec,
}

impl ProcessStageLauncher {
  pub fn new(sync: CommandSpec, resolve: CommandSpec) -> Self {
    Self { runner: StageRunner::default(), sync, resolve }
  }

  /// Stage commands from `cfg`, defaulting to this executable's own
  /// `stage` subcommand with the same config file.
  pub fn from_config(cfg: &ServiceConfig, exe: &Path, config_path: &Path) -> Self {
    Self::new(
      cfg.stage_command(Stage::RequestSync, exe, config_path),
      cfg.stage_command(Stage::AddressResolve, exe, config_path),
    )
  }
}

impl StageLauncher for ProcessStageLauncher {
  async fn launch(&self, stage: Stage) -> StageResult {
    let spec = match stage {
      Stage::RequestSync => &self.sync,
      Stage::AddressResolve => &self.resolve,
    };
    self.runner.run(stage.as_ref(), spec).await
  }
}

// ─── Control loop ────────────────────────────────────────────────────────────

pub struct Orchestrator<L> {
  launcher: Arc<L>,
  policy:   SchedulePolicy,
  enabled:  bool,
  commands: mpsc::Receiver<SchedulerCommand>,
  status:   watch::Sender<SchedulerSnapshot>,
  shutdown: CancellationToken,
}

enum Wake {
  Shutdown,
  Tick,
  Command(SchedulerCommand),
}

impl<L: StageLauncher> Orchestrator<L> {
  /// Build the loop and the link its observers use. Nothing runs until
  /// [`run`](Self::run) is awaited. A disabled scheduler hands out a
  /// detached link, so commands are refused from the start.
  pub fn new(
    launcher: L,
    policy: SchedulePolicy,
    enabled: bool,
    shutdown: CancellationToken,
  ) -> (Self, SchedulerLink) {
    let (status, status_rx) = watch::channel(SchedulerSnapshot::disabled());
    // One slot: a second trigger while one is pending is redundant.
    let (commands_tx, commands) = mpsc::channel(1);
    let orchestrator = Self {
      launcher: Arc::new(launcher),
      policy,
      enabled,
      commands,
      status,
      shutdown,
    };
    let link = if enabled {
      SchedulerLink::new(status_rx, commands_tx)
    } else {
      SchedulerLink::detached()
    };
    (orchestrator, link)
  }

  /// Run until the shutdown token is cancelled. Returns the final state.
  ///
  /// When auto-fetch is disabled this returns at once without launching
  /// anything.
  pub async fn run(mut self) -> Option<SchedulerState> {
    if !self.enabled {
      tracing::info!("auto-fetch disabled; no fetch cycles will run");
      self.status.send_replace(SchedulerSnapshot::disabled());
      return None;
    }

    let mut state = SchedulerState::new(Instant::now());
    tracing::info!(
      interval_secs = self.policy.interval.as_secs(),
      retry_delay_secs = self.policy.retry_delay.as_secs(),
      tick_secs = self.policy.tick.as_secs(),
      "scheduler started; first cycle runs now"
    );
    self.publish(&state);

    let mut ticker = tokio::time::interval(self.policy.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      let wake = tokio::select! {
        biased;
        _ = self.shutdown.cancelled() => Wake::Shutdown,
        Some(command) = self.commands.recv() => Wake::Command(command),
        _ = ticker.tick() => Wake::Tick,
      };

      match wake {
        Wake::Shutdown => break,
        Wake::Command(SchedulerCommand::RunNow) => {
          state.next_run_at = Instant::now();
          tracing::info!("fetch cycle requested; running at next tick");
          self.publish(&state);
        }
        Wake::Tick => {
          if state.is_due(Instant::now()) {
            self.run_cycle(&mut state).await;
          }
        }
      }
    }

    state.phase = Phase::ShuttingDown;
    self.publish(&state);
    tracing::info!(cycles_run = state.cycles_run, "scheduler stopped");
    Some(state)
  }

  async fn run_cycle(&self, state: &mut SchedulerState) {
    let cycle = state.cycles_run + 1;
    state.phase = Phase::Running { cycle };
    self.publish(state);

    let started_at = Utc::now();
    tracing::info!(cycle, "fetch cycle starting");

    // The cycle runs in its own task so a panic in a launcher is contained.
    let launcher = Arc::clone(&self.launcher);
    let policy = self.policy.clone();
    let shutdown = self.shutdown.clone();
    let handle =
      tokio::spawn(async move { run_stages(launcher.as_ref(), &policy, &shutdown).await });

    let (outcome, stages) = match handle.await {
      Ok(result) => result,
      Err(e) => {
        tracing::error!(cycle, error = %e, "fetch cycle panicked; treating as degraded");
        (CycleOutcome::Degraded, vec![])
      }
    };

    let summary = CycleSummary { cycle, outcome, started_at, finished_at: Utc::now(), stages };
    state.complete(summary, Instant::now(), &self.policy);

    let next_run_in_secs = self.policy.delay_after(outcome).as_secs();
    match outcome {
      CycleOutcome::Success => {
        tracing::info!(cycle, %outcome, next_run_in_secs, "fetch cycle finished");
      }
      CycleOutcome::Degraded => tracing::warn!(
        cycle,
        %outcome,
        consecutive_degraded = state.consecutive_degraded,
        next_run_in_secs,
        "fetch cycle degraded; retrying after fixed delay"
      ),
      CycleOutcome::Interrupted => {
        tracing::info!(cycle, %outcome, "fetch cycle interrupted by shutdown");
      }
    }
    self.publish(state);
  }

  fn publish(&self, state: &SchedulerState) {
    self.status.send_replace(state.snapshot(&self.policy, Instant::now()));
  }
}

async fn run_stages<L: StageLauncher>(
  launcher: &L,
  policy: &SchedulePolicy,
  shutdown: &CancellationToken,
) -> (CycleOutcome, Vec<StageSummary>) {
  let mut stages = vec![launch(launcher, Stage::RequestSync).await];

  let interrupted = tokio::select! {
    _ = shutdown.cancelled() => true,
    _ = tokio::time::sleep(policy.inter_stage_delay) => false,
  };
  if interrupted {
    tracing::warn!(stage = %Stage::AddressResolve, "shutdown requested; stage skipped");
    return (CycleOutcome::Interrupted, stages);
  }

  stages.push(launch(launcher, Stage::AddressResolve).await);
  let outcome = if stages.iter().all(|s| s.success) {
    CycleOutcome::Success
  } else {
    CycleOutcome::Degraded
  };
  (outcome, stages)
}

async fn launch<L: StageLauncher>(launcher: &L, stage: Stage) -> StageSummary {
  let result = launcher.launch(stage).await;
  StageSummary {
    stage,
    success: result.success,
    exit_code: result.exit_code,
    elapsed_ms: result.elapsed.as_millis() as u64,
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  };

  use super::*;

  /// Records every launch with its offset from `origin`.
  struct FakeLauncher {
    origin:      Instant,
    calls:       Mutex<Vec<(Stage, Duration)>>,
    fail_sync:   bool,
    panic_first: bool,
    stage_time:  Duration,
    active:      AtomicUsize,
    max_active:  AtomicUsize,
  }

  impl FakeLauncher {
    fn new() -> Self {
      Self {
        origin:      Instant::now(),
        calls:       Mutex::new(vec![]),
        fail_sync:   false,
        panic_first: false,
        stage_time:  Duration::ZERO,
        active:      AtomicUsize::new(0),
        max_active:  AtomicUsize::new(0),
      }
    }
  }

  impl StageLauncher for FakeLauncher {
    async fn launch(&self, stage: Stage) -> StageResult {
      let n = {
        let mut calls = self.calls.lock().unwrap();
        calls.push((stage, self.origin.elapsed()));
        calls.len()
      };
      if self.panic_first && n == 1 {
        panic!("launcher bug");
      }

      let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
      self.max_active.fetch_max(active, Ordering::SeqCst);
      tokio::time::sleep(self.stage_time).await;
      self.active.fetch_sub(1, Ordering::SeqCst);

      let success = !(self.fail_sync && stage == Stage::RequestSync);
      StageResult {
        success,
        output: String::new(),
        exit_code: Some(if success { 0 } else { 1 }),
        elapsed: self.stage_time,
      }
    }
  }

  fn policy() -> SchedulePolicy {
    SchedulePolicy::new(Duration::from_secs(12 * 60))
  }

  fn calls(launcher: &FakeLauncher) -> Vec<(Stage, u64)> {
    launcher
      .calls
      .lock()
      .unwrap()
      .iter()
      .map(|(stage, at)| (*stage, at.as_secs()))
      .collect()
  }

  /// Run the loop for `duration` of virtual time, then shut it down.
  async fn run_for(
    launcher: Arc<FakeLauncher>,
    policy: SchedulePolicy,
    duration: Duration,
  ) -> Option<SchedulerState> {
    let token = CancellationToken::new();
    let (orchestrator, _link) = Orchestrator::new(SharedLauncher(launcher), policy, true, token.clone());
    let task = tokio::spawn(orchestrator.run());
    tokio::time::sleep(duration).await;
    token.cancel();
    task.await.unwrap()
  }

  struct SharedLauncher(Arc<FakeLauncher>);

  impl StageLauncher for SharedLauncher {
    async fn launch(&self, stage: Stage) -> StageResult { self.0.launch(stage).await }
  }

  #[test]
  fn oversized_delay_is_capped() {
    let now = Instant::now();
    let mut state = SchedulerState::new(now);
    let policy = SchedulePolicy { retry_delay: Duration::MAX, ..SchedulePolicy::new(Duration::MAX) };
    let summary = |outcome| CycleSummary {
      cycle: 1,
      outcome,
      started_at: Utc::now(),
      finished_at: Utc::now(),
      stages: vec![],
    };

    state.complete(summary(CycleOutcome::Success), now, &policy);
    assert_eq!(state.next_run_at, now + MAX_INTERVAL);
    state.complete(summary(CycleOutcome::Degraded), now, &policy);
    assert_eq!(state.next_run_at, now + MAX_INTERVAL);
  }

  #[tokio::test(start_paused = true)]
  async fn first_cycle_is_immediate_and_success_waits_full_interval() {
    let launcher = Arc::new(FakeLauncher::new());
    let state = run_for(launcher.clone(), policy(), Duration::from_secs(13 * 60)).await.unwrap();

    // Cycle 1 ends at 10s; next due at 730s; first tick at or after is 750s.
    assert_eq!(
      calls(&launcher),
      vec![
        (Stage::RequestSync, 0),
        (Stage::AddressResolve, 10),
        (Stage::RequestSync, 750),
        (Stage::AddressResolve, 760),
      ]
    );
    assert_eq!(state.cycles_run, 2);
    assert_eq!(state.consecutive_degraded, 0);
    assert_eq!(state.phase, Phase::ShuttingDown);
  }

  #[tokio::test(start_paused = true)]
  async fn degraded_cycle_retries_after_fixed_delay() {
    let launcher = Arc::new(FakeLauncher { fail_sync: true, ..FakeLauncher::new() });
    let state = run_for(launcher.clone(), policy(), Duration::from_secs(650)).await.unwrap();

    // Stage B runs even though Stage A failed. Cycle 1 ends at 10s, the retry
    // is due at 310s and the first tick at or after that is 330s.
    assert_eq!(
      calls(&launcher),
      vec![
        (Stage::RequestSync, 0),
        (Stage::AddressResolve, 10),
        (Stage::RequestSync, 330),
        (Stage::AddressResolve, 340),
      ]
    );
    assert_eq!(state.consecutive_degraded, 2);
    let last = state.last_cycle.unwrap();
    assert_eq!(last.outcome, CycleOutcome::Degraded);
    assert_eq!(last.stages.len(), 2);
    assert_eq!(last.stages[0].exit_code, Some(1));
  }

  #[tokio::test(start_paused = true)]
  async fn disabled_scheduler_never_launches() {
    let launcher = Arc::new(FakeLauncher::new());
    let (orchestrator, link) = Orchestrator::new(
      SharedLauncher(launcher.clone()),
      policy(),
      false,
      CancellationToken::new(),
    );
    assert_eq!(link.snapshot().phase, SchedulerPhase::Disabled);
    assert!(link.send(SchedulerCommand::RunNow).is_err());

    assert!(orchestrator.run().await.is_none());
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert!(calls(&launcher).is_empty());
    assert_eq!(link.snapshot().phase, SchedulerPhase::Disabled);
  }

  #[tokio::test(start_paused = true)]
  async fn shutdown_during_inter_stage_delay_skips_stage_b() {
    let launcher = Arc::new(FakeLauncher::new());
    let state = run_for(launcher.clone(), policy(), Duration::from_secs(5)).await.unwrap();

    assert_eq!(calls(&launcher), vec![(Stage::RequestSync, 0)]);
    let last = state.last_cycle.unwrap();
    assert_eq!(last.outcome, CycleOutcome::Interrupted);
    assert_eq!(last.stages.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn in_flight_stage_finishes_before_shutdown() {
    let launcher = Arc::new(FakeLauncher {
      stage_time: Duration::from_secs(60),
      ..FakeLauncher::new()
    });
    let state = run_for(launcher.clone(), policy(), Duration::from_secs(30)).await.unwrap();

    // Stage A was mid-run at cancellation; it completes, Stage B does not start.
    assert_eq!(calls(&launcher), vec![(Stage::RequestSync, 0)]);
    let last = state.last_cycle.unwrap();
    assert_eq!(last.outcome, CycleOutcome::Interrupted);
    assert_eq!(last.stages[0].elapsed_ms, 60_000);
  }

  #[tokio::test(start_paused = true)]
  async fn panicking_cycle_is_degraded_and_loop_continues() {
    let launcher = Arc::new(FakeLauncher { panic_first: true, ..FakeLauncher::new() });
    let state = run_for(launcher.clone(), policy(), Duration::from_secs(6 * 60)).await.unwrap();

    // The panic ends cycle 1 at 0s; retry due at 300s.
    assert_eq!(
      calls(&launcher),
      vec![
        (Stage::RequestSync, 0),
        (Stage::RequestSync, 300),
        (Stage::AddressResolve, 310),
      ]
    );
    assert_eq!(state.cycles_run, 2);
    assert_eq!(state.last_cycle.unwrap().outcome, CycleOutcome::Success);
  }

  #[tokio::test(start_paused = true)]
  async fn cycles_never_overlap() {
    let launcher = Arc::new(FakeLauncher {
      stage_time: Duration::from_secs(90),
      ..FakeLauncher::new()
    });
    let policy = SchedulePolicy::new(Duration::from_secs(60));
    run_for(launcher.clone(), policy, Duration::from_secs(30 * 60)).await;

    assert_eq!(launcher.max_active.load(Ordering::SeqCst), 1);
    let calls = calls(&launcher);
    assert!(calls.len() >= 6);
    for pair in calls.chunks(2) {
      assert_eq!(pair[0].0, Stage::RequestSync);
      if let Some(second) = pair.get(1) {
        assert_eq!(second.0, Stage::AddressResolve);
        assert!(second.1 >= pair[0].1 + 100);
      }
    }
  }

  #[tokio::test(start_paused = true)]
  async fn run_now_triggers_at_next_tick() {
    let launcher = Arc::new(FakeLauncher::new());
    let token = CancellationToken::new();
    let (orchestrator, link) =
      Orchestrator::new(SharedLauncher(launcher.clone()), policy(), true, token.clone());
    let task = tokio::spawn(orchestrator.run());

    tokio::time::sleep(Duration::from_secs(100)).await;
    let snapshot = link.snapshot();
    assert_eq!(snapshot.phase, SchedulerPhase::Idle);
    assert_eq!(snapshot.cycles_run, 1);
    assert_eq!(snapshot.interval_secs, 720);
    assert!(snapshot.next_run_at.is_some());

    link.send(SchedulerCommand::RunNow).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    token.cancel();
    task.await.unwrap();

    assert_eq!(
      calls(&launcher),
      vec![
        (Stage::RequestSync, 0),
        (Stage::AddressResolve, 10),
        (Stage::RequestSync, 120),
        (Stage::AddressResolve, 130),
      ]
    );
    assert_eq!(link.snapshot().phase, SchedulerPhase::ShuttingDown);
  }
}
