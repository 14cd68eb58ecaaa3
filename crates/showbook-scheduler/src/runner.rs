//! Runs one fetch stage as a child process.
//!
//! Output lines are forwarded to `tracing` as they arrive (stdout at `info`,
//! stderr at `warn`, both tagged with the stage name) and captured up to a
//! byte cap. The runner never retries and never returns an error: every way a
//! stage can go wrong ends up in [`StageResult`].

use std::{process::Stdio, time::Duration};

use showbook_core::command::CommandSpec;
use tokio::{
  io::{AsyncBufReadExt as _, AsyncRead, BufReader},
  process::Command,
  sync::mpsc,
  task::JoinHandle,
  time::Instant,
};

/// Default cap on captured output per stage.
pub const MAX_OUTPUT_BYTES: usize = 64 * 1024;

const TRUNCATED: &str = "[output truncated]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
  /// True iff the process exited with status zero.
  pub success:   bool,
  /// Interleaved stdout and stderr, or the spawn error.
  pub output:    String,
  /// `None` when the process never started, was killed, or died by signal.
  pub exit_code: Option<i32>,
  pub elapsed:   Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct StageRunner {
  max_output: usize,
}

impl Default for StageRunner {
  fn default() -> Self { Self { max_output: MAX_OUTPUT_BYTES } }
}

#[derive(Clone, Copy)]
enum Stream {
  Stdout,
  Stderr,
}

impl StageRunner {
  pub fn with_max_output(max_output: usize) -> Self { Self { max_output } }

  /// Run `spec` to completion (or until its timeout) and report the result.
  pub async fn run(&self, name: &str, spec: &CommandSpec) -> StageResult {
    let started = Instant::now();
    tracing::info!(stage = name, command = %spec, "stage starting");

    let spawned = Command::new(&spec.program)
      .args(&spec.args)
      .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn();

    let mut child = match spawned {
      Ok(child) => child,
      Err(e) => {
        tracing::error!(stage = name, error = %e, "stage failed to start");
        return StageResult {
          success:   false,
          output:    format!("failed to start {spec}: {e}"),
          exit_code: None,
          elapsed:   started.elapsed(),
        };
      }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
      readers.push(tokio::spawn(forward(name.to_owned(), Stream::Stdout, stdout, tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
      readers.push(tokio::spawn(forward(name.to_owned(), Stream::Stderr, stderr, tx.clone())));
    }
    drop(tx);
    let collector = tokio::spawn(collect(rx, self.max_output));

    let waited = match spec.timeout {
      Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => status.map(Some),
        Err(_) => {
          if let Err(e) = child.kill().await {
            tracing::warn!(stage = name, error = %e, "failed to kill timed-out stage");
          }
          // Descendants may still hold the pipes open.
          for reader in &readers {
            reader.abort();
          }
          Ok(None)
        }
      },
      None => child.wait().await.map(Some),
    };

    let mut output = collector.await.unwrap_or_default();
    let elapsed = started.elapsed();

    let (success, exit_code) = match waited {
      Ok(Some(status)) => (status.success(), status.code()),
      Ok(None) => {
        let limit = spec.timeout.unwrap_or_default();
        push_note(&mut output, &format!("stage timed out after {}s and was killed", limit.as_secs()));
        (false, None)
      }
      Err(e) => {
        push_note(&mut output, &format!("failed to wait for stage: {e}"));
        (false, None)
      }
    };

    if success {
      tracing::info!(stage = name, elapsed_ms = elapsed.as_millis() as u64, "stage succeeded");
    } else {
      tracing::warn!(
        stage = name,
        exit_code = ?exit_code,
        elapsed_ms = elapsed.as_millis() as u64,
        "stage failed"
      );
    }

    StageResult { success, output, exit_code, elapsed }
  }
}

async fn forward<R>(stage: String, stream: Stream, reader: R, tx: mpsc::UnboundedSender<String>)
where
  R: AsyncRead + Unpin,
{
  let mut lines = BufReader::new(reader).lines();
  loop {
    match lines.next_line().await {
      Ok(Some(line)) => {
        match stream {
          Stream::Stdout => tracing::info!(stage = %stage, "{line}"),
          Stream::Stderr => tracing::warn!(stage = %stage, "{line}"),
        }
        if tx.send(line).is_err() {
          break;
        }
      }
      Ok(None) => break,
      Err(e) => {
        tracing::warn!(stage = %stage, error = %e, "stopped reading stage output");
        break;
      }
    }
  }
}

async fn collect(mut rx: mpsc::UnboundedReceiver<String>, max: usize) -> String {
  let mut output = String::new();
  let mut truncated = false;
  while let Some(line) = rx.recv().await {
    if truncated {
      continue;
    }
    if output.len() + line.len() + 1 > max {
      push_note(&mut output, TRUNCATED);
      truncated = true;
      continue;
    }
    output.push_str(&line);
    output.push('\n');
  }
  output
}

fn push_note(output: &mut String, note: &str) {
  if !output.is_empty() && !output.ends_with('\n') {
    output.push('\n');
  }
  output.push_str(note);
  output.push('\n');
}
