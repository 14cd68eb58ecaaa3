//! Showing requests: the unit of work pulled from the remote store.
//!
//! A request moves `received → resolved → booked | failed`. The status is
//! monotonic: merging an older status onto a newer one is a no-op for the
//! status column, and a `booked` request is frozen entirely.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a showing request.
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
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
  Received,
  Resolved,
  Failed,
  Booked,
}

impl RequestStatus {
  /// Position in the lifecycle. Merges never move a request to a lower rank.
  pub fn rank(self) -> u8 {
    match self {
      Self::Received => 0,
      Self::Resolved => 1,
      Self::Failed => 2,
      Self::Booked => 3,
    }
  }

  /// The later of two statuses.
  pub fn max(self, other: Self) -> Self {
    if other.rank() > self.rank() { other } else { self }
  }

  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownRequestStatus(s.to_owned()))
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A showing request as stored in `processed_showing_requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowingRequest {
  /// External, stable identifier assigned by the remote store.
  pub request_id:     String,
  pub user_id:        Option<String>,
  pub property_id:    String,
  pub status:         RequestStatus,
  pub requested_date: Option<NaiveDate>,
  pub requested_time: Option<NaiveTime>,
  pub created_at:     DateTime<Utc>,
  pub processed_at:   Option<DateTime<Utc>>,
}

impl ShowingRequest {
  /// A freshly received request with no schedule hint.
  pub fn received(
    request_id: impl Into<String>,
    property_id: impl Into<String>,
  ) -> Self {
    Self {
      request_id:     request_id.into(),
      user_id:        None,
      property_id:    property_id.into(),
      status:         RequestStatus::Received,
      requested_date: None,
      requested_time: None,
      created_at:     Utc::now(),
      processed_at:   None,
    }
  }

  /// Merge `incoming` onto this (stored) record.
  ///
  /// Optional fields prefer the incoming value and fall back to the stored
  /// one. `created_at` keeps the stored value. A booked record is returned
  /// unchanged.
  pub fn merge(&self, incoming: &ShowingRequest) -> ShowingRequest {
    if self.status == RequestStatus::Booked {
      return self.clone();
    }

    ShowingRequest {
      request_id:     self.request_id.clone(),
      user_id:        incoming.user_id.clone().or_else(|| self.user_id.clone()),
      property_id:    if incoming.property_id.is_empty() {
        self.property_id.clone()
      } else {
        incoming.property_id.clone()
      },
      status:         self.status.max(incoming.status),
      requested_date: incoming.requested_date.or(self.requested_date),
      requested_time: incoming.requested_time.or(self.requested_time),
      created_at:     self.created_at,
      processed_at:   incoming.processed_at.or(self.processed_at),
    }
  }
}

/// What an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
  Inserted,
  Updated,
  Unchanged,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stored(status: RequestStatus) -> ShowingRequest {
    let mut r = ShowingRequest::received("req-1", "prop-1");
    r.status = status;
    r
  }

  #[test]
  fn status_roundtrips_through_strings() {
    for s in [
      RequestStatus::Received,
      RequestStatus::Resolved,
      RequestStatus::Failed,
      RequestStatus::Booked,
    ] {
      assert_eq!(RequestStatus::parse(s.as_ref()).unwrap(), s);
    }
    assert!(RequestStatus::parse("pending").is_err());
  }

  #[test]
  fn merge_never_lowers_status() {
    let existing = stored(RequestStatus::Resolved);
    let merged = existing.merge(&stored(RequestStatus::Received));
    assert_eq!(merged.status, RequestStatus::Resolved);

    let merged = existing.merge(&stored(RequestStatus::Failed));
    assert_eq!(merged.status, RequestStatus::Failed);
  }

  #[test]
  fn booked_request_is_frozen() {
    let existing = stored(RequestStatus::Booked);
    let mut incoming = stored(RequestStatus::Received);
    incoming.property_id = "prop-2".into();
    incoming.user_id = Some("someone-else".into());

    assert_eq!(existing.merge(&incoming), existing);
  }

  #[test]
  fn merge_keeps_known_optional_fields() {
    let mut existing = stored(RequestStatus::Received);
    existing.user_id = Some("user-9".into());
    existing.requested_date = NaiveDate::from_ymd_opt(2024, 5, 1);

    let merged = existing.merge(&stored(RequestStatus::Received));
    assert_eq!(merged.user_id.as_deref(), Some("user-9"));
    assert_eq!(merged.requested_date, existing.requested_date);
    assert_eq!(merged.created_at, existing.created_at);
  }
}
