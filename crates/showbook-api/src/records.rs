//! Read-only handlers over the store.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/showing-requests` | Optional `?status=received\|resolved\|failed\|booked` |
//! | `GET`  | `/showing-requests/{id}` | 404 if not found |
//! | `GET`  | `/properties` | Optional `?address=<substring>` |
//! | `GET`  | `/properties/{id}` | 404 if not found |
//! | `GET`  | `/scheduled-properties` | Properties with an open showing request |
//! | `GET`  | `/bookings` | Optional `?property_id=<id>` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use showbook_core::{
  booking::Booking,
  property::{Property, ScheduledProperty},
  request::{RequestStatus, ShowingRequest},
  session::SessionProvider,
  store::ShowingStore,
};

use crate::{AppState, error::ApiError};

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> ApiError {
  ApiError::Store(Box::new(e))
}

// ─── Showing requests ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RequestParams {
  pub status: Option<String>,
}

/// `GET /showing-requests[?status=<status>]`
pub async fn list_requests<S, P>(
  State(state): State<AppState<S, P>>,
  Query(params): Query<RequestParams>,
) -> Result<Json<Vec<ShowingRequest>>, ApiError>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  let status = params
    .status
    .as_deref()
    .map(RequestStatus::parse)
    .transpose()
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let requests = state
    .store
    .list_showing_requests(status)
    .await
    .map_err(store_err)?;
  Ok(Json(requests))
}

/// `GET /showing-requests/{id}`
pub async fn get_request<S, P>(
  State(state): State<AppState<S, P>>,
  Path(id): Path<String>,
) -> Result<Json<ShowingRequest>, ApiError>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  let request = state
    .store
    .get_showing_request(&id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("showing request {id} not found")))?;
  Ok(Json(request))
}

// ─── Properties ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PropertyParams {
  /// Substring matched against address, city and province.
  pub address: Option<String>,
}

/// `GET /properties[?address=<substring>]`
pub async fn list_properties<S, P>(
  State(state): State<AppState<S, P>>,
  Query(params): Query<PropertyParams>,
) -> Result<Json<Vec<Property>>, ApiError>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  let properties = state
    .store
    .list_properties(params.address.as_deref())
    .await
    .map_err(store_err)?;
  Ok(Json(properties))
}

/// `GET /properties/{id}`
pub async fn get_property<S, P>(
  State(state): State<AppState<S, P>>,
  Path(id): Path<String>,
) -> Result<Json<Property>, ApiError>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  let property = state
    .store
    .get_property(&id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("property {id} not found")))?;
  Ok(Json(property))
}

/// `GET /scheduled-properties`
pub async fn scheduled<S, P>(
  State(state): State<AppState<S, P>>,
) -> Result<Json<Vec<ScheduledProperty>>, ApiError>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  let scheduled = state
    .store
    .list_scheduled_properties()
    .await
    .map_err(store_err)?;
  Ok(Json(scheduled))
}

// ─── Bookings ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BookingParams {
  pub property_id: Option<String>,
}

/// `GET /bookings[?property_id=<id>]`
pub async fn list_bookings<S, P>(
  State(state): State<AppState<S, P>>,
  Query(params): Query<BookingParams>,
) -> Result<Json<Vec<Booking>>, ApiError>
where
  S: ShowingStore + 'static,
  P: SessionProvider + 'static,
{
  let bookings = state
    .store
    .list_bookings(params.property_id.as_deref())
    .await
    .map_err(store_err)?;
  Ok(Json(bookings))
}
