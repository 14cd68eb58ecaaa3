//! `showbookd`: the showbook service binary.
//!
//! ```text
//! showbookd [--config showbook.toml] [serve]
//! showbookd stage sync|resolve
//! showbookd book <request-id> --name <name> --email <email> [--phone ..] [--message ..]
//! ```
//!
//! `serve` runs the fetch scheduler and the HTTP API until SIGINT/SIGTERM.
//! The `stage` subcommands are what the scheduler spawns for each stage.

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
  sync::Arc,
};

use anyhow::Context as _;
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use showbook_api::{AppState, LoginSupervisor};
use showbook_core::{booking::Requester, slot::parse_time_slot};
use showbook_scheduler::{
  ServiceConfig,
  booking::{BookingRequest, CommandBookingExecutor, book_showing},
  orchestrator::{Orchestrator, ProcessStageLauncher, SchedulePolicy},
  session::FileSessionProvider,
  stages::{HttpSource, resolve, sync},
};
use showbook_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Exit status after a panic when `exit_on_panic` is set (EX_SOFTWARE).
const PANIC_EXIT_CODE: i32 = 70;

#[derive(Parser)]
#[command(author, version, about = "Showbook showing-request service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "showbook.toml", env = "SHOWBOOK_CONFIG")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Run the fetch scheduler and the HTTP API (default).
  Serve,
  /// Run one fetch stage and exit.
  Stage {
    #[command(subcommand)]
    stage: StageCommand,
  },
  /// Book a showing for one request.
  Book(BookArgs),
}

#[derive(Subcommand)]
enum StageCommand {
  /// Stage A: pull showing requests into the store.
  Sync,
  /// Stage B: resolve property addresses.
  Resolve,
}

#[derive(clap::Args)]
struct BookArgs {
  request_id: String,
  #[arg(long)]
  name:       String,
  #[arg(long)]
  email:      String,
  #[arg(long)]
  phone:      Option<String>,
  #[arg(long)]
  message:    Option<String>,
  /// Overrides the requested date (YYYY-MM-DD).
  #[arg(long)]
  date:       Option<NaiveDate>,
  /// Overrides the requested time (`14:30`, `2:30 PM`, ...).
  #[arg(long, value_parser = parse_time_arg)]
  time:       Option<NaiveTime>,
  /// Showing length in minutes (default from config).
  #[arg(long)]
  duration:   Option<u32>,
}

fn parse_time_arg(raw: &str) -> Result<NaiveTime, String> {
  parse_time_slot(raw).ok_or_else(|| format!("unrecognised time {raw:?}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let cfg = ServiceConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
  install_panic_hook(cfg.exit_on_panic);

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(cfg, &cli.config).await.map(|()| ExitCode::SUCCESS),
    Command::Stage { stage } => run_stage(&cfg, stage).await,
    Command::Book(args) => book(&cfg, args).await.map(|()| ExitCode::SUCCESS),
  }
}

// ─── serve ───────────────────────────────────────────────────────────────────

async fn serve(cfg: ServiceConfig, config_path: &Path) -> anyhow::Result<()> {
  let store = open_store(&cfg).await?;
  let session = session_provider(&cfg);

  let shutdown = CancellationToken::new();
  let exe = std::env::current_exe().context("failed to locate the showbookd executable")?;
  let (orchestrator, link) = Orchestrator::new(
    ProcessStageLauncher::from_config(&cfg, &exe, config_path),
    SchedulePolicy::from_config(&cfg),
    cfg.enable_auto_fetch,
    shutdown.clone(),
  );
  let scheduler = tokio::spawn(orchestrator.run());

  let state = AppState {
    store:     Arc::new(store),
    session:   Arc::new(session),
    logins:    LoginSupervisor::new(cfg.login_command()),
    scheduler: link,
  };
  let app = axum::Router::new().nest("/api", showbook_api::api_router(state));

  let address = format!("{}:{}", cfg.host, cfg.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("Listening on http://{address}");

  let token = shutdown.clone();
  tokio::spawn(async move {
    shutdown_signal().await;
    token.cancel();
  });

  let server_token = shutdown.clone();
  axum::serve(listener, app)
    .with_graceful_shutdown(async move { server_token.cancelled().await })
    .await
    .context("server error")?;

  // Let an in-flight stage finish before exiting.
  shutdown.cancel();
  if let Err(e) = scheduler.await {
    tracing::error!(error = %e, "scheduler task ended abnormally");
  }
  tracing::info!("Shutdown complete");
  Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl+C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
    _ = terminate => tracing::info!("Received terminate signal, shutting down"),
  }
}

/// Log panics through `tracing`; optionally exit so a supervisor restarts us.
fn install_panic_hook(exit_on_panic: bool) {
  std::panic::set_hook(Box::new(move |info| {
    let location = info
      .location()
      .map(|l| format!("{}:{}", l.file(), l.line()))
      .unwrap_or_default();
    tracing::error!(%location, "panic: {info}");
    if exit_on_panic {
      std::process::exit(PANIC_EXIT_CODE);
    }
  }));
}

// ─── stage ───────────────────────────────────────────────────────────────────

async fn run_stage(cfg: &ServiceConfig, stage: StageCommand) -> anyhow::Result<ExitCode> {
  let store = open_store(cfg).await?;

  let result = match stage {
    StageCommand::Sync => {
      let url = cfg.sync.url.as_deref().context("sync.url is not configured")?;
      let source = HttpSource::new(url, cfg.sync.api_key.clone())?;
      sync::sync_requests(&store, &source).await.and_then(|r| r.into_result()).map(drop)
    }
    StageCommand::Resolve => {
      let url = cfg.resolver.url.as_deref().context("resolver.url is not configured")?;
      let source = HttpSource::new(url, cfg.resolver.api_key.clone())?;
      resolve::resolve_addresses(&store, &source)
        .await
        .and_then(|r| r.into_result())
        .map(drop)
    }
  };

  Ok(match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      tracing::error!(error = %e, "stage failed");
      ExitCode::FAILURE
    }
  })
}

// ─── book ────────────────────────────────────────────────────────────────────

async fn book(cfg: &ServiceConfig, args: BookArgs) -> anyhow::Result<()> {
  let store = open_store(cfg).await?;
  let command = cfg.booking_command().context("booking.command is not configured")?;
  let executor = CommandBookingExecutor::new(command);

  let request = BookingRequest {
    request_id:       args.request_id,
    requester:        Requester {
      name:    args.name,
      email:   args.email,
      phone:   args.phone,
      message: args.message,
    },
    date:             args.date,
    time:             args.time,
    duration_minutes: args.duration.unwrap_or(cfg.booking.default_duration_minutes),
  };

  let booking = book_showing(
    &store,
    &session_provider(cfg),
    &executor,
    request,
    Local::now().date_naive(),
  )
  .await?;

  println!("{}", serde_json::to_string_pretty(&booking)?);
  Ok(())
}

// ─── helpers ─────────────────────────────────────────────────────────────────

async fn open_store(cfg: &ServiceConfig) -> anyhow::Result<SqliteStore> {
  let path = expand_tilde(&cfg.store_path);
  SqliteStore::open(&path)
    .await
    .with_context(|| format!("failed to open store at {path:?}"))
}

fn session_provider(cfg: &ServiceConfig) -> FileSessionProvider {
  FileSessionProvider::new(expand_tilde(&cfg.session.file))
    .with_max_age_hours(cfg.session.max_age_hours)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
