//! The `ShowingStore` trait.
//!
//! Stages and the API talk to the store through these narrow operations, never
//! through raw SQL, so the merge and append-only invariants live in one place.

use std::future::Future;

use crate::{
  booking::{Booking, NewBooking},
  property::{Property, PropertyRecord, ScheduledProperty},
  request::{RequestStatus, ShowingRequest, UpsertOutcome},
};

/// Abstraction over the persistent store shared by every stage.
///
/// - Showing requests are upserted by id; their status never moves backwards
///   and a booked request is never modified.
/// - Property upserts merge field by field and never replace a known value
///   with null.
/// - Bookings are append-only.
pub trait ShowingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Showing requests ──────────────────────────────────────────────────

  /// Insert or merge a showing request keyed by `request_id`.
  fn upsert_showing_request(
    &self,
    record: ShowingRequest,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + '_;

  /// Advance a request's status and stamp `processed_at`.
  ///
  /// Follows the same monotonic merge as
  /// [`upsert_showing_request`](Self::upsert_showing_request). Returns the
  /// stored row after the merge, or `None` if the id is unknown.
  fn set_request_status<'a>(
    &'a self,
    request_id: &'a str,
    status: RequestStatus,
  ) -> impl Future<Output = Result<Option<ShowingRequest>, Self::Error>> + Send + 'a;

  fn get_showing_request<'a>(
    &'a self,
    request_id: &'a str,
  ) -> impl Future<Output = Result<Option<ShowingRequest>, Self::Error>> + Send + 'a;

  /// All requests, newest first, optionally filtered by status.
  fn list_showing_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> impl Future<Output = Result<Vec<ShowingRequest>, Self::Error>> + Send + '_;

  /// Requests still waiting for address resolution, oldest first.
  fn list_unresolved_requests(
    &self,
  ) -> impl Future<Output = Result<Vec<ShowingRequest>, Self::Error>> + Send + '_;

  // ── Properties ────────────────────────────────────────────────────────

  /// Insert or merge a property keyed by `property_id`.
  fn upsert_property(
    &self,
    record: PropertyRecord,
  ) -> impl Future<Output = Result<Property, Self::Error>> + Send + '_;

  fn get_property<'a>(
    &'a self,
    property_id: &'a str,
  ) -> impl Future<Output = Result<Option<Property>, Self::Error>> + Send + 'a;

  /// Properties whose address, city or province contains `filter`
  /// (case-insensitive), most recently updated first.
  fn list_properties<'a>(
    &'a self,
    filter: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<Property>, Self::Error>> + Send + 'a;

  /// Properties with an open (`received` or `resolved`) showing request,
  /// ready to be handed to the booking executor.
  fn list_scheduled_properties(
    &self,
  ) -> impl Future<Output = Result<Vec<ScheduledProperty>, Self::Error>> + Send + '_;

  // ── Bookings (append-only) ────────────────────────────────────────────

  fn insert_booking(
    &self,
    record: NewBooking,
  ) -> impl Future<Output = Result<Booking, Self::Error>> + Send + '_;

  /// Bookings, newest first, optionally for one property.
  fn list_bookings<'a>(
    &'a self,
    property_id: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<Booking>, Self::Error>> + Send + 'a;
}
