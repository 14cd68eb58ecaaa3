//! `showbook`: operator CLI for the showbook service.
//!
//! # Usage
//!
//! ```
//! showbook status
//! showbook requests --status resolved
//! showbook --url http://showbook.local:3000 fetch-now
//! showbook --config ~/.config/showbook/cli.toml scheduler
//! showbook export bookings --output bookings.jsonl
//! ```

mod client;
mod export;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use export::{ExportTable, write_json_lines};
use serde::{Deserialize, Serialize};
use showbook_core::{
  booking::Booking,
  property::{Property, ScheduledProperty},
  request::ShowingRequest,
  schedule::SchedulerSnapshot,
  session::SessionMetadata,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "showbook", about = "Operator CLI for the showbook service")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the showbook service (default: http://localhost:3000).
  #[arg(long, env = "SHOWBOOK_URL")]
  url: Option<String>,

  /// Print raw JSON instead of a summary.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Browser session status.
  Status,
  /// Start the interactive login flow.
  Login,
  /// Supervised login processes.
  Logins,
  /// Showing requests.
  Requests {
    #[arg(long)]
    status: Option<String>,
  },
  /// Properties, optionally filtered by address, city or province.
  Properties {
    #[arg(long)]
    address: Option<String>,
  },
  /// Properties with an open showing request.
  Scheduled,
  /// Booking attempts.
  Bookings {
    #[arg(long)]
    property: Option<String>,
  },
  /// Fetch scheduler state.
  Scheduler,
  /// Run a fetch cycle as soon as possible.
  FetchNow,
  /// Dump a whole table as JSON Lines.
  Export {
    #[arg(value_enum)]
    table:  ExportTable,
    /// Write to FILE instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<std::path::PathBuf>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:3000".to_string()),
  };
  tracing::debug!(base_url = %api_config.base_url, "using showbook API");

  let client = ApiClient::new(api_config)?;
  let json = args.json;

  match args.command {
    Cmd::Status => {
      let session = client.session_status().await?;
      emit(json, &session, print_session)
    }
    Cmd::Login => {
      let started = client.manual_login().await?;
      match started.pid {
        Some(pid) => println!("{} (pid {pid}, task {})", started.message, started.task_id),
        None => println!("{} (task {})", started.message, started.task_id),
      }
      Ok(())
    }
    Cmd::Logins => {
      let tasks = client.logins().await?;
      println!("{}", serde_json::to_string_pretty(&tasks)?);
      Ok(())
    }
    Cmd::Requests { status } => {
      let requests = client.showing_requests(status.as_deref()).await?;
      emit(json, &requests[..], print_requests)
    }
    Cmd::Properties { address } => {
      let properties = client.properties(address.as_deref()).await?;
      emit(json, &properties[..], print_properties)
    }
    Cmd::Scheduled => {
      let scheduled = client.scheduled().await?;
      emit(json, &scheduled[..], print_scheduled)
    }
    Cmd::Bookings { property } => {
      let bookings = client.bookings(property.as_deref()).await?;
      emit(json, &bookings[..], print_bookings)
    }
    Cmd::Scheduler => {
      let snapshot = client.scheduler_status().await?;
      emit(json, &snapshot, print_scheduler)
    }
    Cmd::FetchNow => {
      client.fetch_now().await?;
      println!("Fetch cycle requested.");
      Ok(())
    }
    Cmd::Export { table, output } => {
      let rows = client.export_rows(table).await?;
      match output {
        Some(path) => {
          let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
          let count = write_json_lines(std::io::BufWriter::new(file), &rows)?;
          eprintln!("exported {count} row(s) to {}", path.display());
        }
        None => {
          write_json_lines(std::io::stdout().lock(), &rows)?;
        }
      }
      Ok(())
    }
  }
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, summary: fn(&T)) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(value)?);
  } else {
    summary(value);
  }
  Ok(())
}

fn or_dash(value: Option<&str>) -> &str { value.unwrap_or("-") }

fn print_session(s: &SessionMetadata) {
  println!("valid:      {}", s.is_valid);
  println!("user:       {}", or_dash(s.user_email.as_deref()));
  println!(
    "last login: {}",
    s.last_login.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into())
  );
}

fn print_requests(requests: &[ShowingRequest]) {
  for r in requests {
    let date = r.requested_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    let time = r.requested_time.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "-".into());
    println!("{:<16} {:<9} {:<16} {date} {time}", r.request_id, r.status, r.property_id);
  }
  println!("{} request(s)", requests.len());
}

fn print_properties(properties: &[Property]) {
  for p in properties {
    println!("{:<16} {}", p.property_id, or_dash(p.address.as_deref()));
  }
  println!("{} propert(ies)", properties.len());
}

fn print_scheduled(scheduled: &[ScheduledProperty]) {
  for s in scheduled {
    println!(
      "{:<16} {:<16} {}",
      s.request.request_id,
      s.property.property_id,
      or_dash(s.property.address.as_deref())
    );
  }
  println!("{} scheduled", scheduled.len());
}

fn print_bookings(bookings: &[Booking]) {
  for b in bookings {
    println!(
      "#{:<5} {:<16} {} {} {:<9} {}",
      b.id,
      b.property_id,
      b.booking_date,
      b.booking_time.format("%H:%M"),
      b.status,
      b.requester.email
    );
  }
  println!("{} booking(s)", bookings.len());
}

fn print_scheduler(s: &SchedulerSnapshot) {
  println!("phase:       {}", s.phase);
  println!("interval:    {}s (retry {}s)", s.interval_secs, s.retry_delay_secs);
  println!("cycles run:  {} ({} degraded in a row)", s.cycles_run, s.consecutive_degraded);
  println!(
    "next run:    {}",
    s.next_run_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into())
  );
  if let Some(last) = &s.last_cycle {
    println!("last cycle:  #{} {} at {}", last.cycle, last.outcome, last.finished_at.to_rfc3339());
    for stage in &last.stages {
      println!(
        "  {:<16} {} (exit {:?}, {} ms)",
        stage.stage,
        if stage.success { "ok" } else { "FAILED" },
        stage.exit_code,
        stage.elapsed_ms
      );
    }
  }
}
