//! Service configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. the TOML file given with `--config` (optional)
//! 3. `SHOWBOOK_*` environment variables, `__` between nested keys
//!    (`SHOWBOOK_SYNC__URL`)
//! 4. the unprefixed `FETCH_INTERVAL_MINUTES` and `ENABLE_AUTO_FETCH`

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;
use showbook_core::{command::CommandSpec, schedule::Stage};

use crate::{Error, Result, orchestrator::MAX_INTERVAL};

const MAX_FETCH_INTERVAL_MINUTES: u64 = MAX_INTERVAL.as_secs() / 60;
const MAX_POLL_TICK_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  #[serde(default = "default_true")]
  pub enable_auto_fetch:      bool,
  #[serde(default = "default_fetch_interval")]
  pub fetch_interval_minutes: u64,
  #[serde(default = "default_poll_tick")]
  pub poll_tick_secs:         u64,
  #[serde(default = "default_inter_stage_delay")]
  pub inter_stage_delay_secs: u64,
  #[serde(default = "default_stage_timeout")]
  pub stage_timeout_secs:     u64,
  /// Exit with status 70 after logging a panic, for supervised deployments.
  #[serde(default)]
  pub exit_on_panic:          bool,
  #[serde(default)]
  pub session:                SessionConfig,
  #[serde(default)]
  pub sync:                   SyncConfig,
  #[serde(default)]
  pub resolver:               ResolverConfig,
  #[serde(default)]
  pub booking:                BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// JSON metadata written by the external login flow.
  #[serde(default = "default_session_file")]
  pub file:          PathBuf,
  /// Logins older than this are reported invalid.
  #[serde(default)]
  pub max_age_hours: Option<u64>,
  /// argv of the interactive login flow started by `POST /api/manual-login`.
  #[serde(default)]
  pub login_command: Vec<String>,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self { file: default_session_file(), max_age_hours: None, login_command: vec![] }
  }
}

/// Stage A: remote source of showing requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
  pub url:     Option<String>,
  pub api_key: Option<String>,
  /// Overrides the default `showbookd stage sync` command.
  #[serde(default)]
  pub command: Vec<String>,
}

/// Stage B: property detail source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolverConfig {
  pub url:     Option<String>,
  pub api_key: Option<String>,
  /// Overrides the default `showbookd stage resolve` command.
  #[serde(default)]
  pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
  /// argv of the booking automation; booking flags are appended.
  #[serde(default)]
  pub command:                  Vec<String>,
  #[serde(default = "default_booking_timeout")]
  pub timeout_secs:             u64,
  #[serde(default = "default_duration")]
  pub default_duration_minutes: u32,
}

impl Default for BookingConfig {
  fn default() -> Self {
    Self {
      command:                  vec![],
      timeout_secs:             default_booking_timeout(),
      default_duration_minutes: default_duration(),
    }
  }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 3000 }
fn default_store_path() -> PathBuf { PathBuf::from("showbook.db") }
fn default_true() -> bool { true }
fn default_fetch_interval() -> u64 { 12 }
fn default_poll_tick() -> u64 { 30 }
fn default_inter_stage_delay() -> u64 { 10 }
fn default_stage_timeout() -> u64 { 600 }
fn default_session_file() -> PathBuf { PathBuf::from("session/metadata.json") }
fn default_booking_timeout() -> u64 { 300 }
fn default_duration() -> u32 { 30 }

impl ServiceConfig {
  /// Load from `path` and the process environment.
  pub fn load(path: &Path) -> Result<Self> {
    Self::load_with(
      path,
      std::env::var("FETCH_INTERVAL_MINUTES").ok(),
      std::env::var("ENABLE_AUTO_FETCH").ok(),
    )
  }

  /// Load with explicit values for the two unprefixed variables.
  pub fn load_with(
    path: &Path,
    fetch_interval_minutes: Option<String>,
    enable_auto_fetch: Option<String>,
  ) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("SHOWBOOK")
          .prefix_separator("_")
          .separator("__"),
      )
      .set_override_option("fetch_interval_minutes", fetch_interval_minutes)?
      .set_override_option("enable_auto_fetch", enable_auto_fetch)?
      .build()?;

    let cfg: Self = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  fn validate(&self) -> Result<()> {
    if self.fetch_interval_minutes == 0 {
      return Err(Error::InvalidConfig("fetch_interval_minutes must be at least 1".into()));
    }
    if self.fetch_interval_minutes > MAX_FETCH_INTERVAL_MINUTES {
      return Err(Error::InvalidConfig(format!(
        "fetch_interval_minutes must be at most {MAX_FETCH_INTERVAL_MINUTES}"
      )));
    }
    if self.poll_tick_secs == 0 {
      return Err(Error::InvalidConfig("poll_tick_secs must be at least 1".into()));
    }
    if self.poll_tick_secs > MAX_POLL_TICK_SECS {
      return Err(Error::InvalidConfig(format!("poll_tick_secs must be at most {MAX_POLL_TICK_SECS}")));
    }
    Ok(())
  }

  pub fn fetch_interval(&self) -> Duration {
    Duration::from_secs(self.fetch_interval_minutes.saturating_mul(60))
  }

  pub fn poll_tick(&self) -> Duration { Duration::from_secs(self.poll_tick_secs) }

  pub fn inter_stage_delay(&self) -> Duration { Duration::from_secs(self.inter_stage_delay_secs) }

  pub fn stage_timeout(&self) -> Duration { Duration::from_secs(self.stage_timeout_secs) }

  pub fn login_command(&self) -> Option<CommandSpec> {
    CommandSpec::from_argv(&self.session.login_command)
  }

  pub fn booking_command(&self) -> Option<CommandSpec> {
    CommandSpec::from_argv(&self.booking.command)
      .map(|spec| spec.timeout(Duration::from_secs(self.booking.timeout_secs)))
  }

  /// The command for `stage`: the configured override, or
  /// `exe --config <config_path> stage <name>`.
  pub fn stage_command(&self, stage: Stage, exe: &Path, config_path: &Path) -> CommandSpec {
    let (argv, name) = match stage {
      Stage::RequestSync => (&self.sync.command, "sync"),
      Stage::AddressResolve => (&self.resolver.command, "resolve"),
    };
    CommandSpec::from_argv(argv)
      .unwrap_or_else(|| {
        CommandSpec::new(exe.to_string_lossy())
          .arg("--config")
          .arg(config_path.to_string_lossy())
          .args(["stage", name])
      })
      .timeout(self.stage_timeout())
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
  }

  #[test]
  fn defaults_apply_without_a_file() {
    let cfg = ServiceConfig::load_with(Path::new("/nonexistent/showbook.toml"), None, None).unwrap();
    assert!(cfg.enable_auto_fetch);
    assert_eq!(cfg.fetch_interval(), Duration::from_secs(12 * 60));
    assert_eq!(cfg.poll_tick(), Duration::from_secs(30));
    assert_eq!(cfg.booking.default_duration_minutes, 30);
    assert!(cfg.login_command().is_none());
  }

  #[test]
  fn file_values_are_read() {
    let file = write_config(
      r#"
      port = 8080
      fetch_interval_minutes = 20

      [sync]
      url = "https://requests.example.com/api/showings"

      [booking]
      command = ["node", "book.js"]
      timeout_secs = 60
      "#,
    );
    let cfg = ServiceConfig::load_with(file.path(), None, None).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.fetch_interval_minutes, 20);
    assert_eq!(cfg.sync.url.as_deref(), Some("https://requests.example.com/api/showings"));

    let booking = cfg.booking_command().unwrap();
    assert_eq!(booking.program, "node");
    assert_eq!(booking.timeout, Some(Duration::from_secs(60)));
  }

  #[test]
  fn unprefixed_variables_override_the_file() {
    let file = write_config("fetch_interval_minutes = 20\nenable_auto_fetch = true\n");
    let cfg = ServiceConfig::load_with(file.path(), Some("5".into()), Some("false".into())).unwrap();
    assert_eq!(cfg.fetch_interval_minutes, 5);
    assert!(!cfg.enable_auto_fetch);
  }

  #[test]
  fn zero_interval_is_rejected() {
    let err = ServiceConfig::load_with(Path::new("/nonexistent/x.toml"), Some("0".into()), None)
      .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
  }

  #[test]
  fn oversized_intervals_are_rejected() {
    let missing = Path::new("/nonexistent/x.toml");
    let err = ServiceConfig::load_with(missing, Some("1441".into()), None).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    let err = ServiceConfig::load_with(missing, Some("525600".into()), None).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    let file = write_config("poll_tick_secs = 86400\n");
    let err = ServiceConfig::load_with(file.path(), None, None).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    let cfg = ServiceConfig::load_with(missing, Some("1440".into()), None).unwrap();
    assert_eq!(cfg.fetch_interval(), Duration::from_secs(24 * 60 * 60));
  }

  #[test]
  fn stage_command_defaults_to_own_subcommand() {
    let cfg = ServiceConfig::load_with(Path::new("/nonexistent/x.toml"), None, None).unwrap();
    let spec = cfg.stage_command(
      Stage::AddressResolve,
      Path::new("/usr/bin/showbookd"),
      Path::new("/etc/showbook.toml"),
    );
    assert_eq!(spec.to_string(), "/usr/bin/showbookd --config /etc/showbook.toml stage resolve");
    assert_eq!(spec.timeout, Some(Duration::from_secs(600)));
  }
}
