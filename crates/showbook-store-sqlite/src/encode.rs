//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, calendar dates `YYYY-MM-DD`, times of day
//! `HH:MM`. Status enums are stored as their snake_case names.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use showbook_core::{
  booking::{Booking, BookingStatus, Requester},
  property::Property,
  request::{RequestStatus, ShowingRequest},
};

use crate::{Error, Result};

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── NaiveDate / NaiveTime
// ────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_time(t: NaiveTime) -> String { t.format("%H:%M").to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, "%H:%M")
    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Showing requests ────────────────────────────────────────────────────────

pub const REQUEST_COLUMNS: &str = "request_id, user_id, property_id, status, \
  requested_date, requested_time, created_at, processed_at";

/// Raw strings read directly from a `processed_showing_requests` row.
pub struct RawShowingRequest {
  pub request_id:     String,
  pub user_id:        Option<String>,
  pub property_id:    String,
  pub status:         String,
  pub requested_date: Option<String>,
  pub requested_time: Option<String>,
  pub created_at:     String,
  pub processed_at:   Option<String>,
}

impl RawShowingRequest {
  /// Read [`REQUEST_COLUMNS`] starting at column `offset`.
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:     row.get(offset)?,
      user_id:        row.get(offset + 1)?,
      property_id:    row.get(offset + 2)?,
      status:         row.get(offset + 3)?,
      requested_date: row.get(offset + 4)?,
      requested_time: row.get(offset + 5)?,
      created_at:     row.get(offset + 6)?,
      processed_at:   row.get(offset + 7)?,
    })
  }

  pub fn encode(r: &ShowingRequest) -> Self {
    Self {
      request_id:     r.request_id.clone(),
      user_id:        r.user_id.clone(),
      property_id:    r.property_id.clone(),
      status:         r.status.as_ref().to_owned(),
      requested_date: r.requested_date.map(encode_date),
      requested_time: r.requested_time.map(encode_time),
      created_at:     encode_dt(r.created_at),
      processed_at:   r.processed_at.map(encode_dt),
    }
  }

  pub fn into_request(self) -> Result<ShowingRequest> {
    Ok(ShowingRequest {
      request_id:     self.request_id,
      user_id:        self.user_id,
      property_id:    self.property_id,
      status:         RequestStatus::parse(&self.status)?,
      requested_date: self.requested_date.as_deref().map(decode_date).transpose()?,
      requested_time: self.requested_time.as_deref().map(decode_time).transpose()?,
      created_at:     decode_dt(&self.created_at)?,
      processed_at:   self.processed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

// ─── Properties ──────────────────────────────────────────────────────────────

pub const PROPERTY_COLUMNS: &str = "property_id, address, city, province, \
  postal_code, price, bedrooms, bathrooms, square_feet, property_type, \
  listing_url, mls_number, listing_status, description, updated_at";

/// Raw values read directly from a `properties` row.
pub struct RawProperty {
  pub property_id:    String,
  pub address:        Option<String>,
  pub city:           Option<String>,
  pub province:       Option<String>,
  pub postal_code:    Option<String>,
  pub price:          Option<i64>,
  pub bedrooms:       Option<i64>,
  pub bathrooms:      Option<f64>,
  pub square_feet:    Option<i64>,
  pub property_type:  Option<String>,
  pub listing_url:    Option<String>,
  pub mls_number:     Option<String>,
  pub listing_status: Option<String>,
  pub description:    Option<String>,
  pub updated_at:     String,
}

impl RawProperty {
  /// Read [`PROPERTY_COLUMNS`] starting at column `offset`.
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      property_id:    row.get(offset)?,
      address:        row.get(offset + 1)?,
      city:           row.get(offset + 2)?,
      province:       row.get(offset + 3)?,
      postal_code:    row.get(offset + 4)?,
      price:          row.get(offset + 5)?,
      bedrooms:       row.get(offset + 6)?,
      bathrooms:      row.get(offset + 7)?,
      square_feet:    row.get(offset + 8)?,
      property_type:  row.get(offset + 9)?,
      listing_url:    row.get(offset + 10)?,
      mls_number:     row.get(offset + 11)?,
      listing_status: row.get(offset + 12)?,
      description:    row.get(offset + 13)?,
      updated_at:     row.get(offset + 14)?,
    })
  }

  pub fn into_property(self) -> Result<Property> {
    Ok(Property {
      property_id:    self.property_id,
      address:        self.address,
      city:           self.city,
      province:       self.province,
      postal_code:    self.postal_code,
      price:          self.price,
      bedrooms:       self.bedrooms,
      bathrooms:      self.bathrooms,
      square_feet:    self.square_feet,
      property_type:  self.property_type,
      listing_url:    self.listing_url,
      mls_number:     self.mls_number,
      listing_status: self.listing_status,
      description:    self.description,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Bookings ────────────────────────────────────────────────────────────────

pub const BOOKING_COLUMNS: &str = "id, property_id, request_id, booking_date, \
  booking_time, duration_minutes, requester_name, requester_email, \
  requester_phone, message, status, auto_confirmed, booking_url, \
  screenshot_path, confirmation_text, created_at";

/// Raw values read directly from a `bookings` row.
pub struct RawBooking {
  pub id:                i64,
  pub property_id:       String,
  pub request_id:        Option<String>,
  pub booking_date:      String,
  pub booking_time:      String,
  pub duration_minutes:  u32,
  pub requester_name:    String,
  pub requester_email:   String,
  pub requester_phone:   Option<String>,
  pub message:           Option<String>,
  pub status:            String,
  pub auto_confirmed:    bool,
  pub booking_url:       Option<String>,
  pub screenshot_path:   Option<String>,
  pub confirmation_text: Option<String>,
  pub created_at:        String,
}

impl RawBooking {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      property_id:       row.get(1)?,
      request_id:        row.get(2)?,
      booking_date:      row.get(3)?,
      booking_time:      row.get(4)?,
      duration_minutes:  row.get(5)?,
      requester_name:    row.get(6)?,
      requester_email:   row.get(7)?,
      requester_phone:   row.get(8)?,
      message:           row.get(9)?,
      status:            row.get(10)?,
      auto_confirmed:    row.get(11)?,
      booking_url:       row.get(12)?,
      screenshot_path:   row.get(13)?,
      confirmation_text: row.get(14)?,
      created_at:        row.get(15)?,
    })
  }

  pub fn into_booking(self) -> Result<Booking> {
    Ok(Booking {
      id:                self.id,
      property_id:       self.property_id,
      request_id:        self.request_id,
      booking_date:      decode_date(&self.booking_date)?,
      booking_time:      decode_time(&self.booking_time)?,
      duration_minutes:  self.duration_minutes,
      requester:         Requester {
        name:    self.requester_name,
        email:   self.requester_email,
        phone:   self.requester_phone,
        message: self.message,
      },
      status:            BookingStatus::parse(&self.status)?,
      auto_confirmed:    self.auto_confirmed,
      booking_url:       self.booking_url,
      screenshot_path:   self.screenshot_path,
      confirmation_text: self.confirmation_text,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}
