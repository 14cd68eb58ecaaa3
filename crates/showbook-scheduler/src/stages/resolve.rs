//! Stage B: resolve property addresses for received showing requests.

use reqwest::StatusCode;
use serde::Deserialize;
use showbook_core::{
  property::PropertyRecord,
  request::{RequestStatus, ShowingRequest},
  schedule::Stage,
  store::ShowingStore,
};

use super::{HttpSource, lenient_f64, lenient_i64, non_blank};
use crate::{Error, Result};

/// Property details as the resolver source reports them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProperty {
  #[serde(default, deserialize_with = "non_blank")]
  pub address:        Option<String>,
  #[serde(default, deserialize_with = "non_blank")]
  pub city:           Option<String>,
  #[serde(default, deserialize_with = "non_blank")]
  pub province:       Option<String>,
  #[serde(default, deserialize_with = "non_blank")]
  pub postal_code:    Option<String>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub price:          Option<i64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub bedrooms:       Option<i64>,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub bathrooms:      Option<f64>,
  #[serde(default, deserialize_with = "lenient_i64")]
  pub square_feet:    Option<i64>,
  #[serde(default, deserialize_with = "non_blank")]
  pub property_type:  Option<String>,
  #[serde(default, deserialize_with = "non_blank")]
  pub listing_url:    Option<String>,
  #[serde(default, deserialize_with = "non_blank")]
  pub mls_number:     Option<String>,
  #[serde(default, deserialize_with = "non_blank")]
  pub listing_status: Option<String>,
  #[serde(default, deserialize_with = "non_blank")]
  pub description:    Option<String>,
}

impl RemoteProperty {
  /// Explicit city, province and postal code win over values parsed from
  /// the address.
  pub fn into_record(self, property_id: &str) -> PropertyRecord {
    let record = PropertyRecord {
      city: self.city,
      province: self.province,
      postal_code: self.postal_code,
      price: self.price,
      bedrooms: self.bedrooms,
      bathrooms: self.bathrooms,
      square_feet: self.square_feet,
      property_type: self.property_type,
      listing_url: self.listing_url,
      mls_number: self.mls_number,
      listing_status: self.listing_status,
      description: self.description,
      ..PropertyRecord::new(property_id)
    };
    match self.address {
      Some(address) => record.with_address(address),
      None => record,
    }
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveReport {
  pub pending:       usize,
  /// The property already had an address.
  pub already_known: usize,
  /// Fetched and now has an address.
  pub resolved:      usize,
  /// Fetched, but the source had no address for it.
  pub unresolved:    usize,
  /// The source does not know the property.
  pub not_found:     usize,
  pub failed:        usize,
}

impl ResolveReport {
  pub fn into_result(self) -> Result<Self> {
    match self.failed {
      0 => Ok(self),
      failures => Err(Error::StageFailed { stage: Stage::AddressResolve, failures }),
    }
  }
}

enum Resolution {
  AlreadyKnown,
  Resolved,
  Unresolved,
  NotFound,
}

/// Resolve every `received` request, oldest first.
///
/// Per-request failures are counted and logged; processing continues.
pub async fn resolve_addresses<S: ShowingStore>(
  store: &S,
  source: &HttpSource,
) -> Result<ResolveReport> {
  let pending = store.list_unresolved_requests().await.map_err(Error::store)?;
  let mut report = ResolveReport { pending: pending.len(), ..ResolveReport::default() };

  for request in &pending {
    match resolve_one(store, source, request).await {
      Ok(Resolution::AlreadyKnown) => report.already_known += 1,
      Ok(Resolution::Resolved) => report.resolved += 1,
      Ok(Resolution::Unresolved) => report.unresolved += 1,
      Ok(Resolution::NotFound) => report.not_found += 1,
      Err(e) => {
        tracing::warn!(
          request = %request.request_id,
          property = %request.property_id,
          error = %e,
          "address resolution failed"
        );
        report.failed += 1;
      }
    }
  }

  tracing::info!(
    pending = report.pending,
    already_known = report.already_known,
    resolved = report.resolved,
    unresolved = report.unresolved,
    not_found = report.not_found,
    failed = report.failed,
    "address resolution finished"
  );
  Ok(report)
}

async fn resolve_one<S: ShowingStore>(
  store: &S,
  source: &HttpSource,
  request: &ShowingRequest,
) -> Result<Resolution> {
  let property_id = request.property_id.as_str();

  if let Some(property) = store.get_property(property_id).await.map_err(Error::store)?
    && property.is_resolved()
  {
    mark_resolved(store, request).await?;
    return Ok(Resolution::AlreadyKnown);
  }

  let resp = source.get(&format!("/properties/{property_id}")).send().await?;
  if resp.status() == StatusCode::NOT_FOUND {
    tracing::warn!(property = property_id, "property unknown to resolver; stored without address");
    store
      .upsert_property(PropertyRecord::new(property_id))
      .await
      .map_err(Error::store)?;
    return Ok(Resolution::NotFound);
  }

  let details: RemoteProperty = resp.error_for_status()?.json().await?;
  let property = store
    .upsert_property(details.into_record(property_id))
    .await
    .map_err(Error::store)?;

  if property.is_resolved() {
    mark_resolved(store, request).await?;
    tracing::info!(
      request = %request.request_id,
      property = property_id,
      address = property.address.as_deref().unwrap_or_default(),
      "address resolved"
    );
    Ok(Resolution::Resolved)
  } else {
    tracing::warn!(property = property_id, "resolver returned no address");
    Ok(Resolution::Unresolved)
  }
}

async fn mark_resolved<S: ShowingStore>(store: &S, request: &ShowingRequest) -> Result<()> {
  store
    .set_request_status(&request.request_id, RequestStatus::Resolved)
    .await
    .map_err(Error::store)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use showbook_store_sqlite::SqliteStore;
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
  };

  use super::*;

  async fn store_with(requests: &[(&str, &str)]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    for (id, property) in requests {
      store
        .upsert_showing_request(ShowingRequest::received(*id, *property))
        .await
        .unwrap();
    }
    store
  }

  fn source(server: &MockServer) -> HttpSource {
    HttpSource::new(server.uri(), None).unwrap()
  }

  async fn status_of(store: &SqliteStore, id: &str) -> RequestStatus {
    store.get_showing_request(id).await.unwrap().unwrap().status
  }

  #[tokio::test]
  async fn fetched_address_is_split_and_request_resolved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/properties/p1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "address": "275 Larch Street #G612, Toronto, ON M5T 0E2",
        "price": "$899,000",
        "bedrooms": 2,
        "bathrooms": "2.5",
        "squareFeet": "1,050 sq ft",
        "mlsNumber": "C1234567",
      })))
      .expect(1)
      .mount(&server)
      .await;
    let store = store_with(&[("r1", "p1")]).await;

    let report = resolve_addresses(&store, &source(&server)).await.unwrap();
    assert_eq!(report.resolved, 1);
    assert_eq!(status_of(&store, "r1").await, RequestStatus::Resolved);

    let property = store.get_property("p1").await.unwrap().unwrap();
    assert_eq!(property.city.as_deref(), Some("Toronto"));
    assert_eq!(property.province.as_deref(), Some("ON"));
    assert_eq!(property.postal_code.as_deref(), Some("M5T 0E2"));
    assert_eq!(property.price, Some(899_000));
    assert_eq!(property.bathrooms, Some(2.5));
    assert_eq!(property.square_feet, Some(1050));
  }

  #[tokio::test]
  async fn known_address_skips_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(500))
      .expect(0)
      .mount(&server)
      .await;
    let store = store_with(&[("r1", "p1")]).await;
    store
      .upsert_property(PropertyRecord::new("p1").with_address("1 King St W, Toronto, ON"))
      .await
      .unwrap();

    let report = resolve_addresses(&store, &source(&server)).await.unwrap();
    assert_eq!(report.already_known, 1);
    assert_eq!(status_of(&store, "r1").await, RequestStatus::Resolved);
  }

  #[tokio::test]
  async fn unknown_property_gets_a_bare_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/properties/p404"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;
    let store = store_with(&[("r1", "p404")]).await;

    let report = resolve_addresses(&store, &source(&server)).await.unwrap();
    assert_eq!(report.not_found, 1);
    assert!(report.into_result().is_ok());
    assert_eq!(status_of(&store, "r1").await, RequestStatus::Received);

    let bare = store.get_property("p404").await.unwrap().unwrap();
    assert_eq!(bare.address, None);
  }

  #[tokio::test]
  async fn one_failure_does_not_stop_the_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/properties/broken"))
      .respond_with(ResponseTemplate::new(502))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/properties/p2"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({"address": "5 Spring Garden Rd, Halifax, NS"})),
      )
      .mount(&server)
      .await;
    let store = store_with(&[("r1", "broken"), ("r2", "p2")]).await;

    let report = resolve_addresses(&store, &source(&server)).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.resolved, 1);
    assert_eq!(status_of(&store, "r1").await, RequestStatus::Received);
    assert_eq!(status_of(&store, "r2").await, RequestStatus::Resolved);
    assert!(matches!(
      report.into_result(),
      Err(Error::StageFailed { stage: Stage::AddressResolve, failures: 1 })
    ));
  }

  #[tokio::test]
  async fn details_without_address_leave_request_received() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/properties/p1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"price": 500000, "address": " "})))
      .mount(&server)
      .await;
    let store = store_with(&[("r1", "p1")]).await;

    let report = resolve_addresses(&store, &source(&server)).await.unwrap();
    assert_eq!(report.unresolved, 1);
    assert_eq!(status_of(&store, "r1").await, RequestStatus::Received);
    assert_eq!(store.get_property("p1").await.unwrap().unwrap().price, Some(500_000));
  }
}
