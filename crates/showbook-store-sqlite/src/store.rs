//! [`SqliteStore`]: the SQLite implementation of [`ShowingStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use showbook_core::{
  booking::{Booking, NewBooking},
  property::{Property, PropertyRecord, ScheduledProperty},
  request::{RequestStatus, ShowingRequest, UpsertOutcome},
  store::ShowingStore,
};

use crate::{
  Error, Result,
  encode::{
    BOOKING_COLUMNS, PROPERTY_COLUMNS, REQUEST_COLUMNS, RawBooking, RawProperty,
    RawShowingRequest, encode_date, encode_dt, encode_time,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A showbook store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("store schema initialised");
    Ok(())
  }
}

/// `a, b` → `alias.a, alias.b`
fn prefixed(columns: &str, alias: &str) -> String {
  columns
    .split(',')
    .map(|c| format!("{alias}.{}", c.trim()))
    .collect::<Vec<_>>()
    .join(", ")
}

fn select_request(
  conn: &rusqlite::Connection,
  request_id: &str,
) -> std::result::Result<Option<ShowingRequest>, tokio_rusqlite::Error> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {REQUEST_COLUMNS} FROM processed_showing_requests WHERE request_id = ?1"
      ),
      rusqlite::params![request_id],
      |row| RawShowingRequest::from_row(row, 0),
    )
    .optional()?;

  raw
    .map(RawShowingRequest::into_request)
    .transpose()
    .map_err(Error::into_db)
}

fn write_request(
  conn: &rusqlite::Connection,
  request: &ShowingRequest,
) -> std::result::Result<(), tokio_rusqlite::Error> {
  let raw = RawShowingRequest::encode(request);
  conn.execute(
    "INSERT INTO processed_showing_requests (
       request_id, user_id, property_id, status,
       requested_date, requested_time, created_at, processed_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT(request_id) DO UPDATE SET
       user_id        = excluded.user_id,
       property_id    = excluded.property_id,
       status         = excluded.status,
       requested_date = excluded.requested_date,
       requested_time = excluded.requested_time,
       processed_at   = excluded.processed_at",
    rusqlite::params![
      raw.request_id,
      raw.user_id,
      raw.property_id,
      raw.status,
      raw.requested_date,
      raw.requested_time,
      raw.created_at,
      raw.processed_at,
    ],
  )?;
  Ok(())
}

fn select_property(
  conn: &rusqlite::Connection,
  property_id: &str,
) -> rusqlite::Result<Option<RawProperty>> {
  conn
    .query_row(
      &format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE property_id = ?1"),
      rusqlite::params![property_id],
      |row| RawProperty::from_row(row, 0),
    )
    .optional()
}

// ─── ShowingStore impl ───────────────────────────────────────────────────────

impl ShowingStore for SqliteStore {
  type Error = Error;

  // ── Showing requests ──────────────────────────────────────────────────────

  async fn upsert_showing_request(&self, record: ShowingRequest) -> Result<UpsertOutcome> {
    if record.request_id.trim().is_empty() {
      return Err(Error::EmptyRequestId);
    }

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = match select_request(&tx, &record.request_id)? {
          None => {
            write_request(&tx, &record)?;
            UpsertOutcome::Inserted
          }
          Some(current) => {
            let merged = current.merge(&record);
            if merged == current {
              UpsertOutcome::Unchanged
            } else {
              write_request(&tx, &merged)?;
              UpsertOutcome::Updated
            }
          }
        };
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  async fn set_request_status(
    &self,
    request_id: &str,
    status: RequestStatus,
  ) -> Result<Option<ShowingRequest>> {
    let id = request_id.to_owned();

    let stored = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(current) = select_request(&tx, &id)? else {
          return Ok(None);
        };

        let advances = current.status.max(status) != current.status;
        let incoming = ShowingRequest {
          status,
          processed_at: advances.then(Utc::now),
          ..current.clone()
        };
        let merged = current.merge(&incoming);
        if merged != current {
          write_request(&tx, &merged)?;
        }
        tx.commit()?;
        Ok(Some(merged))
      })
      .await?;

    Ok(stored)
  }

  async fn get_showing_request(&self, request_id: &str) -> Result<Option<ShowingRequest>> {
    let id = request_id.to_owned();

    let raw: Option<RawShowingRequest> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {REQUEST_COLUMNS} FROM processed_showing_requests WHERE request_id = ?1"
            ),
            rusqlite::params![id],
            |row| RawShowingRequest::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawShowingRequest::into_request).transpose()
  }

  async fn list_showing_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> Result<Vec<ShowingRequest>> {
    let status_str = status.map(|s| s.as_ref().to_owned());

    let raws: Vec<RawShowingRequest> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REQUEST_COLUMNS} FROM processed_showing_requests
           WHERE ?1 IS NULL OR status = ?1
           ORDER BY created_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![status_str], |row| {
            RawShowingRequest::from_row(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawShowingRequest::into_request).collect()
  }

  async fn list_unresolved_requests(&self) -> Result<Vec<ShowingRequest>> {
    let raws: Vec<RawShowingRequest> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REQUEST_COLUMNS} FROM processed_showing_requests
           WHERE status = 'received'
           ORDER BY created_at ASC"
        ))?;
        let rows = stmt
          .query_map([], |row| RawShowingRequest::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawShowingRequest::into_request).collect()
  }

  // ── Properties ────────────────────────────────────────────────────────────

  async fn upsert_property(&self, record: PropertyRecord) -> Result<Property> {
    if record.property_id.trim().is_empty() {
      return Err(Error::EmptyPropertyId);
    }
    let updated_at = encode_dt(Utc::now());

    let raw: RawProperty = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // COALESCE keeps the stored value wherever the record is NULL.
        tx.execute(
          "INSERT INTO properties (
             property_id, address, city, province, postal_code, price,
             bedrooms, bathrooms, square_feet, property_type, listing_url,
             mls_number, listing_status, description, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
           ON CONFLICT(property_id) DO UPDATE SET
             address        = COALESCE(excluded.address,        properties.address),
             city           = COALESCE(excluded.city,           properties.city),
             province       = COALESCE(excluded.province,       properties.province),
             postal_code    = COALESCE(excluded.postal_code,    properties.postal_code),
             price          = COALESCE(excluded.price,          properties.price),
             bedrooms       = COALESCE(excluded.bedrooms,       properties.bedrooms),
             bathrooms      = COALESCE(excluded.bathrooms,      properties.bathrooms),
             square_feet    = COALESCE(excluded.square_feet,    properties.square_feet),
             property_type  = COALESCE(excluded.property_type,  properties.property_type),
             listing_url    = COALESCE(excluded.listing_url,    properties.listing_url),
             mls_number     = COALESCE(excluded.mls_number,     properties.mls_number),
             listing_status = COALESCE(excluded.listing_status, properties.listing_status),
             description    = COALESCE(excluded.description,    properties.description),
             updated_at     = excluded.updated_at",
          rusqlite::params![
            record.property_id,
            record.address,
            record.city,
            record.province,
            record.postal_code,
            record.price,
            record.bedrooms,
            record.bathrooms,
            record.square_feet,
            record.property_type,
            record.listing_url,
            record.mls_number,
            record.listing_status,
            record.description,
            updated_at,
          ],
        )?;
        let raw = select_property(&tx, &record.property_id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_property()
  }

  async fn get_property(&self, property_id: &str) -> Result<Option<Property>> {
    let id = property_id.to_owned();

    let raw: Option<RawProperty> = self
      .conn
      .call(move |conn| Ok(select_property(conn, &id)?))
      .await?;

    raw.map(RawProperty::into_property).transpose()
  }

  async fn list_properties(&self, filter: Option<&str>) -> Result<Vec<Property>> {
    let pattern = filter
      .map(str::trim)
      .filter(|f| !f.is_empty())
      .map(|f| format!("%{f}%"));

    let raws: Vec<RawProperty> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROPERTY_COLUMNS} FROM properties
           WHERE ?1 IS NULL
              OR address  LIKE ?1
              OR city     LIKE ?1
              OR province LIKE ?1
           ORDER BY updated_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pattern], |row| RawProperty::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProperty::into_property).collect()
  }

  async fn list_scheduled_properties(&self) -> Result<Vec<ScheduledProperty>> {
    let property_count = PROPERTY_COLUMNS.split(',').count();

    let raws: Vec<(RawProperty, RawShowingRequest)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {}, {}
           FROM processed_showing_requests r
           JOIN properties p ON p.property_id = r.property_id
           WHERE r.status IN ('received', 'resolved')
           ORDER BY r.created_at ASC",
          prefixed(PROPERTY_COLUMNS, "p"),
          prefixed(REQUEST_COLUMNS, "r"),
        ))?;
        let rows = stmt
          .query_map([], |row| {
            Ok((
              RawProperty::from_row(row, 0)?,
              RawShowingRequest::from_row(row, property_count)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(p, r)| {
        Ok(ScheduledProperty {
          property: p.into_property()?,
          request:  r.into_request()?,
        })
      })
      .collect()
  }

  // ── Bookings (append-only) ────────────────────────────────────────────────

  async fn insert_booking(&self, record: NewBooking) -> Result<Booking> {
    let created_at = Utc::now();
    let created_str = encode_dt(created_at);
    let date_str = encode_date(record.booking_date);
    let time_str = encode_time(record.booking_time);
    let status_str = record.status.as_ref().to_owned();
    let row = record.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO bookings (
             property_id, request_id, booking_date, booking_time,
             duration_minutes, requester_name, requester_email,
             requester_phone, message, status, auto_confirmed,
             booking_url, screenshot_path, confirmation_text, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
          rusqlite::params![
            row.property_id,
            row.request_id,
            date_str,
            time_str,
            row.duration_minutes,
            row.requester.name,
            row.requester.email,
            row.requester.phone,
            row.requester.message,
            status_str,
            row.auto_confirmed,
            row.booking_url,
            row.screenshot_path,
            row.confirmation_text,
            created_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Booking {
      id,
      property_id:       record.property_id,
      request_id:        record.request_id,
      booking_date:      record.booking_date,
      booking_time:      record.booking_time,
      duration_minutes:  record.duration_minutes,
      requester:         record.requester,
      status:            record.status,
      auto_confirmed:    record.auto_confirmed,
      booking_url:       record.booking_url,
      screenshot_path:   record.screenshot_path,
      confirmation_text: record.confirmation_text,
      created_at,
    })
  }

  async fn list_bookings(&self, property_id: Option<&str>) -> Result<Vec<Booking>> {
    let id = property_id.map(str::to_owned);

    let raws: Vec<RawBooking> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BOOKING_COLUMNS} FROM bookings
           WHERE ?1 IS NULL OR property_id = ?1
           ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawBooking::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBooking::into_booking).collect()
  }
}
