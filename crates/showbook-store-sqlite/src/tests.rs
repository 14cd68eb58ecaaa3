//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, NaiveTime};
use showbook_core::{
  booking::{BookingStatus, NewBooking, Requester},
  property::PropertyRecord,
  request::{RequestStatus, ShowingRequest, UpsertOutcome},
  store::ShowingStore,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn request(id: &str, property: &str) -> ShowingRequest {
  let mut r = ShowingRequest::received(id, property);
  r.user_id = Some("user-1".into());
  r.requested_date = NaiveDate::from_ymd_opt(2024, 6, 1);
  r.requested_time = NaiveTime::from_hms_opt(14, 30, 0);
  r
}

fn booking(property: &str, status: BookingStatus) -> NewBooking {
  NewBooking {
    property_id:       property.into(),
    request_id:        Some("req-1".into()),
    booking_date:      NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    booking_time:      NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
    duration_minutes:  30,
    requester:         Requester {
      name:    "Alice".into(),
      email:   "alice@example.com".into(),
      phone:   None,
      message: Some("Looking forward to it".into()),
    },
    status,
    auto_confirmed:    false,
    booking_url:       None,
    screenshot_path:   Some("/tmp/booking.png".into()),
    confirmation_text: None,
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reopening_a_file_store_keeps_rows() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("reopen.db");

  let s = SqliteStore::open(&path).await.unwrap();
  s.upsert_showing_request(request("req-1", "prop-1")).await.unwrap();
  drop(s);

  // Schema init runs again on open and must not disturb existing tables.
  let s = SqliteStore::open(&path).await.unwrap();
  assert!(s.get_showing_request("req-1").await.unwrap().is_some());
}

// ─── Showing requests ────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_request_is_idempotent() {
  let s = store().await;
  let r = request("req-1", "prop-1");

  assert_eq!(s.upsert_showing_request(r.clone()).await.unwrap(), UpsertOutcome::Inserted);
  assert_eq!(s.upsert_showing_request(r.clone()).await.unwrap(), UpsertOutcome::Unchanged);

  let all = s.list_showing_requests(None).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0], r);
}

#[tokio::test]
async fn upsert_request_updates_changed_fields() {
  let s = store().await;
  s.upsert_showing_request(request("req-1", "prop-1")).await.unwrap();

  let mut changed = request("req-1", "prop-1");
  changed.requested_time = NaiveTime::from_hms_opt(16, 0, 0);
  assert_eq!(s.upsert_showing_request(changed).await.unwrap(), UpsertOutcome::Updated);

  let stored = s.get_showing_request("req-1").await.unwrap().unwrap();
  assert_eq!(stored.requested_time, NaiveTime::from_hms_opt(16, 0, 0));
}

#[tokio::test]
async fn empty_request_id_is_rejected() {
  let s = store().await;
  let err = s.upsert_showing_request(request("  ", "prop-1")).await.unwrap_err();
  assert!(matches!(err, Error::EmptyRequestId));
}

#[tokio::test]
async fn booked_request_survives_older_status() {
  let s = store().await;
  s.upsert_showing_request(request("req-1", "prop-1")).await.unwrap();
  s.set_request_status("req-1", RequestStatus::Booked).await.unwrap();

  // A re-sync delivers the request again with its original status.
  let outcome = s.upsert_showing_request(request("req-1", "prop-2")).await.unwrap();
  assert_eq!(outcome, UpsertOutcome::Unchanged);

  let stored = s.get_showing_request("req-1").await.unwrap().unwrap();
  assert_eq!(stored.status, RequestStatus::Booked);
  assert_eq!(stored.property_id, "prop-1");

  let after = s.set_request_status("req-1", RequestStatus::Resolved).await.unwrap().unwrap();
  assert_eq!(after.status, RequestStatus::Booked);
}

#[tokio::test]
async fn set_request_status_stamps_processed_at() {
  let s = store().await;
  s.upsert_showing_request(request("req-1", "prop-1")).await.unwrap();

  let resolved = s
    .set_request_status("req-1", RequestStatus::Resolved)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(resolved.status, RequestStatus::Resolved);
  assert!(resolved.processed_at.is_some());

  let unchanged = s
    .set_request_status("req-1", RequestStatus::Received)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(unchanged.status, RequestStatus::Resolved);
  assert_eq!(unchanged.processed_at, resolved.processed_at);
}

#[tokio::test]
async fn set_status_on_unknown_request_returns_none() {
  let s = store().await;
  let result = s.set_request_status("missing", RequestStatus::Resolved).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn list_requests_filters_by_status() {
  let s = store().await;
  s.upsert_showing_request(request("req-1", "prop-1")).await.unwrap();
  s.upsert_showing_request(request("req-2", "prop-2")).await.unwrap();
  s.set_request_status("req-2", RequestStatus::Resolved).await.unwrap();

  let received = s.list_showing_requests(Some(RequestStatus::Received)).await.unwrap();
  assert_eq!(received.len(), 1);
  assert_eq!(received[0].request_id, "req-1");

  let unresolved = s.list_unresolved_requests().await.unwrap();
  assert_eq!(unresolved.len(), 1);
  assert_eq!(unresolved[0].request_id, "req-1");
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn property_merge_never_erases_known_fields() {
  let s = store().await;

  let first = s.upsert_property(PropertyRecord::new("1")).await.unwrap();
  assert_eq!(first.address, None);

  let second = s
    .upsert_property(PropertyRecord {
      address: Some("123 Main St".into()),
      price: Some(899_000),
      ..PropertyRecord::new("1")
    })
    .await
    .unwrap();
  assert_eq!(second.address.as_deref(), Some("123 Main St"));

  let third = s.upsert_property(PropertyRecord::new("1")).await.unwrap();
  assert_eq!(third.address.as_deref(), Some("123 Main St"));
  assert_eq!(third.price, Some(899_000));
  assert!(third.updated_at >= second.updated_at);

  assert_eq!(s.list_properties(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn property_fields_can_be_replaced_with_new_values() {
  let s = store().await;
  s.upsert_property(PropertyRecord { bedrooms: Some(2), ..PropertyRecord::new("1") })
    .await
    .unwrap();
  let updated = s
    .upsert_property(PropertyRecord { bedrooms: Some(3), ..PropertyRecord::new("1") })
    .await
    .unwrap();
  assert_eq!(updated.bedrooms, Some(3));
}

#[tokio::test]
async fn list_properties_filters_on_address_city_and_province() {
  let s = store().await;
  s.upsert_property(
    PropertyRecord::new("a").with_address("10 Navy Wharf Court, Toronto, ON M5V 3V2"),
  )
  .await
  .unwrap();
  s.upsert_property(PropertyRecord::new("b").with_address("1 Main St, Halifax, Nova Scotia"))
    .await
    .unwrap();

  let toronto = s.list_properties(Some("toronto")).await.unwrap();
  assert_eq!(toronto.len(), 1);
  assert_eq!(toronto[0].property_id, "a");

  let ns = s.list_properties(Some("NS")).await.unwrap();
  assert_eq!(ns.len(), 1);
  assert_eq!(ns[0].property_id, "b");

  assert_eq!(s.list_properties(Some("")).await.unwrap().len(), 2);
}

#[tokio::test]
async fn scheduled_properties_join_open_requests() {
  let s = store().await;
  s.upsert_property(PropertyRecord::new("prop-1").with_address("1 King St W, Toronto, ON"))
    .await
    .unwrap();
  s.upsert_property(PropertyRecord::new("prop-2").with_address("2 King St W, Toronto, ON"))
    .await
    .unwrap();
  s.upsert_showing_request(request("req-1", "prop-1")).await.unwrap();
  s.upsert_showing_request(request("req-2", "prop-2")).await.unwrap();
  s.upsert_showing_request(request("req-3", "prop-without-row")).await.unwrap();
  s.set_request_status("req-2", RequestStatus::Booked).await.unwrap();

  let scheduled = s.list_scheduled_properties().await.unwrap();
  assert_eq!(scheduled.len(), 1);
  assert_eq!(scheduled[0].property.property_id, "prop-1");
  assert_eq!(scheduled[0].request.request_id, "req-1");
  assert_eq!(scheduled[0].request.requested_time, NaiveTime::from_hms_opt(14, 30, 0));
}

// ─── Bookings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bookings_are_append_only() {
  let s = store().await;

  let failed = s.insert_booking(booking("prop-1", BookingStatus::Failed)).await.unwrap();
  let confirmed = s.insert_booking(booking("prop-1", BookingStatus::Confirmed)).await.unwrap();
  assert_ne!(failed.id, confirmed.id);

  let all = s.list_bookings(Some("prop-1")).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].id, confirmed.id);
  assert_eq!(all[1].status, BookingStatus::Failed);
  assert_eq!(all[1].requester.message.as_deref(), Some("Looking forward to it"));
}

#[tokio::test]
async fn list_bookings_filters_by_property() {
  let s = store().await;
  s.insert_booking(booking("prop-1", BookingStatus::Pending)).await.unwrap();
  s.insert_booking(booking("prop-2", BookingStatus::Pending)).await.unwrap();

  assert_eq!(s.list_bookings(None).await.unwrap().len(), 2);
  let only = s.list_bookings(Some("prop-2")).await.unwrap();
  assert_eq!(only.len(), 1);
  assert_eq!(only[0].screenshot_path.as_deref(), Some("/tmp/booking.png"));
}
