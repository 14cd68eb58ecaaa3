//! Table export as JSON Lines: one API record per line, fields untouched.

use std::io::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

/// Tables `showbook export` can dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportTable {
  Requests,
  Properties,
  Scheduled,
  Bookings,
}

impl ExportTable {
  /// API path of the unfiltered listing.
  pub fn path(self) -> &'static str {
    match self {
      Self::Requests => "/showing-requests",
      Self::Properties => "/properties",
      Self::Scheduled => "/scheduled-properties",
      Self::Bookings => "/bookings",
    }
  }
}

/// Write each row as compact JSON on its own line and return the row count.
pub fn write_json_lines<W: Write, T: Serialize>(mut out: W, rows: &[T]) -> Result<usize> {
  for row in rows {
    serde_json::to_writer(&mut out, row).context("encoding export row")?;
    out.write_all(b"\n").context("writing export row")?;
  }
  out.flush().context("flushing export")?;
  Ok(rows.len())
}
