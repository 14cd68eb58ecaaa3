//! Stage A: pull showing requests from the remote source into the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use showbook_core::{
  request::{RequestStatus, ShowingRequest, UpsertOutcome},
  schedule::Stage,
  slot::parse_time_slot,
  store::ShowingStore,
};

use super::{HttpSource, non_blank, string_or_number};
use crate::{Error, Result};

/// One showing request as the remote source reports it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequest {
  #[serde(deserialize_with = "string_or_number")]
  pub id:             String,
  #[serde(default, deserialize_with = "non_blank")]
  pub user_id:        Option<String>,
  #[serde(deserialize_with = "string_or_number")]
  pub property_id:    String,
  #[serde(default, deserialize_with = "non_blank")]
  pub status:         Option<String>,
  #[serde(default, deserialize_with = "non_blank")]
  pub requested_date: Option<String>,
  #[serde(default, deserialize_with = "non_blank")]
  pub requested_time: Option<String>,
  #[serde(default)]
  pub created_at:     Option<DateTime<Utc>>,
}

impl RemoteRequest {
  /// Normalize into a store record. Unparseable optional fields are dropped
  /// with a warning rather than failing the item.
  pub fn into_request(self) -> ShowingRequest {
    let mut request = ShowingRequest::received(self.id, self.property_id);
    request.user_id = self.user_id;
    request.created_at = self.created_at.unwrap_or(request.created_at);

    if let Some(status) = self.status {
      match RequestStatus::parse(&status) {
        Ok(status) => request.status = status,
        Err(_) => tracing::warn!(request = %request.request_id, %status, "unknown remote status; treating as received"),
      }
    }

    request.requested_date = self.requested_date.and_then(|raw| {
      let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok();
      if date.is_none() {
        tracing::warn!(request = %request.request_id, date = %raw, "unparseable requested date");
      }
      date
    });

    request.requested_time = self.requested_time.and_then(|raw| {
      let time = parse_time_slot(&raw);
      if time.is_none() {
        tracing::warn!(request = %request.request_id, time = %raw, "unparseable requested time");
      }
      time
    });

    request
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
  pub fetched:   usize,
  pub inserted:  usize,
  pub updated:   usize,
  pub unchanged: usize,
  pub failed:    usize,
}

impl SyncReport {
  pub fn into_result(self) -> Result<Self> {
    match self.failed {
      0 => Ok(self),
      failures => Err(Error::StageFailed {
        stage: Stage::RequestSync,
        failures,
      }),
    }
  }
}

/// Fetch every remote request and upsert it by id.
///
/// A failed fetch is an error. An item that does not decode, or whose upsert
/// fails, is counted and the remaining items are still processed.
pub async fn sync_requests<S: ShowingStore>(store: &S, source: &HttpSource) -> Result<SyncReport> {
  let remote: Vec<serde_json::Value> = source.get("").send().await?.error_for_status()?.json().await?;

  let mut report = SyncReport { fetched: remote.len(), ..SyncReport::default() };
  for (index, value) in remote.into_iter().enumerate() {
    let item = match serde_json::from_value::<RemoteRequest>(value) {
      Ok(item) => item,
      Err(e) => {
        tracing::warn!(index, error = %e, "skipping malformed showing request");
        report.failed += 1;
        continue;
      }
    };
    let request = item.into_request();
    let id = request.request_id.clone();
    match store.upsert_showing_request(request).await {
      Ok(UpsertOutcome::Inserted) => report.inserted += 1,
      Ok(UpsertOutcome::Updated) => report.updated += 1,
      Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
      Err(e) => {
        tracing::warn!(request = %id, error = %e, "failed to store showing request");
        report.failed += 1;
      }
    }
  }

  tracing::info!(
    fetched = report.fetched,
    inserted = report.inserted,
    updated = report.updated,
    unchanged = report.unchanged,
    failed = report.failed,
    "request sync finished"
  );
  Ok(report)
}
