//! Booking attempts. Rows are append-only: a correction is a new row.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, request::RequestStatus};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BookingStatus {
  Pending,
  Confirmed,
  Failed,
}

impl BookingStatus {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownBookingStatus(s.to_owned()))
  }

  /// The request status a booking attempt with this status leads to.
  pub fn request_status(self) -> RequestStatus {
    match self {
      Self::Pending | Self::Confirmed => RequestStatus::Booked,
      Self::Failed => RequestStatus::Failed,
    }
  }
}

/// Who asked for the showing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
  pub name:    String,
  pub email:   String,
  pub phone:   Option<String>,
  pub message: Option<String>,
}

/// A persisted booking attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
  pub id:                i64,
  pub property_id:       String,
  /// The showing request this attempt served; not a strict foreign key.
  pub request_id:        Option<String>,
  pub booking_date:      NaiveDate,
  pub booking_time:      NaiveTime,
  pub duration_minutes:  u32,
  pub requester:         Requester,
  pub status:            BookingStatus,
  pub auto_confirmed:    bool,
  pub booking_url:       Option<String>,
  pub screenshot_path:   Option<String>,
  pub confirmation_text: Option<String>,
  pub created_at:        DateTime<Utc>,
}

/// Input to `insert_booking`; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
  pub property_id:       String,
  pub request_id:        Option<String>,
  pub booking_date:      NaiveDate,
  pub booking_time:      NaiveTime,
  pub duration_minutes:  u32,
  pub requester:         Requester,
  pub status:            BookingStatus,
  pub auto_confirmed:    bool,
  pub booking_url:       Option<String>,
  pub screenshot_path:   Option<String>,
  pub confirmation_text: Option<String>,
}

impl NewBooking {
  pub fn from_outcome(slot: BookingSlot, requester: Requester, outcome: BookingOutcome) -> Self {
    Self {
      property_id:       slot.property_id,
      request_id:        slot.request_id,
      booking_date:      slot.date,
      booking_time:      slot.time,
      duration_minutes:  slot.duration_minutes,
      requester,
      status:            outcome.status,
      auto_confirmed:    outcome.auto_confirmed,
      booking_url:       outcome.booking_url,
      screenshot_path:   outcome.screenshot_path,
      confirmation_text: outcome.confirmation_text,
    }
  }
}

/// What to book: a resolved property and a concrete time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSlot {
  pub property_id:      String,
  pub request_id:       Option<String>,
  pub address:          String,
  pub date:             NaiveDate,
  pub time:             NaiveTime,
  pub duration_minutes: u32,
}

/// Result reported by the booking executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOutcome {
  pub status:            BookingStatus,
  #[serde(default)]
  pub auto_confirmed:    bool,
  #[serde(default)]
  pub booking_url:       Option<String>,
  #[serde(default)]
  pub screenshot_path:   Option<String>,
  #[serde(default)]
  pub confirmation_text: Option<String>,
}

impl BookingOutcome {
  pub fn failed(reason: impl Into<String>) -> Self {
    Self {
      status:            BookingStatus::Failed,
      auto_confirmed:    false,
      booking_url:       None,
      screenshot_path:   None,
      confirmation_text: Some(reason.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn outcome_parses_camel_case_with_defaults() {
    let outcome: BookingOutcome = serde_json::from_str(
      r#"{"status":"confirmed","screenshotPath":"/tmp/shot.png"}"#,
    )
    .unwrap();
    assert_eq!(outcome.status, BookingStatus::Confirmed);
    assert!(!outcome.auto_confirmed);
    assert_eq!(outcome.screenshot_path.as_deref(), Some("/tmp/shot.png"));
  }

  #[test]
  fn booking_status_maps_to_request_status() {
    assert_eq!(BookingStatus::Confirmed.request_status(), RequestStatus::Booked);
    assert_eq!(BookingStatus::Pending.request_status(), RequestStatus::Booked);
    assert_eq!(BookingStatus::Failed.request_status(), RequestStatus::Failed);
  }
}
