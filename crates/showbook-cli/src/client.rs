//! Async HTTP client wrapping the showbook JSON API.

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use showbook_core::{
  booking::Booking,
  property::{Property, ScheduledProperty},
  request::ShowingRequest,
  schedule::SchedulerSnapshot,
  session::SessionMetadata,
};
use std::time::Duration;

use crate::export::ExportTable;

/// Connection settings for the showbook API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// Async HTTP client for the showbook JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
  session: SessionMetadata,
}

/// Response of `POST /api/manual-login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStarted {
  pub message: String,
  pub pid:     Option<u32>,
  pub task_id: String,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;
    let resp = check(resp, what).await?;
    resp.json().await.with_context(|| format!("deserialising {what}"))
  }

  // ── Session ───────────────────────────────────────────────────────────────

  /// `GET /api/session-status`
  pub async fn session_status(&self) -> Result<SessionMetadata> {
    let envelope: SessionEnvelope = self
      .send(self.client.get(self.url("/session-status")), "GET /session-status")
      .await?;
    Ok(envelope.session)
  }

  /// `POST /api/manual-login`
  pub async fn manual_login(&self) -> Result<LoginStarted> {
    self
      .send(self.client.post(self.url("/manual-login")), "POST /manual-login")
      .await
  }

  /// `GET /api/logins`
  pub async fn logins(&self) -> Result<Vec<Value>> {
    self.send(self.client.get(self.url("/logins")), "GET /logins").await
  }

  // ── Records ───────────────────────────────────────────────────────────────

  /// `GET /api/showing-requests[?status=<status>]`
  pub async fn showing_requests(&self, status: Option<&str>) -> Result<Vec<ShowingRequest>> {
    let mut req = self.client.get(self.url("/showing-requests"));
    if let Some(status) = status {
      req = req.query(&[("status", status)]);
    }
    self.send(req, "GET /showing-requests").await
  }

  /// `GET /api/properties[?address=<substring>]`
  pub async fn properties(&self, address: Option<&str>) -> Result<Vec<Property>> {
    let mut req = self.client.get(self.url("/properties"));
    if let Some(address) = address {
      req = req.query(&[("address", address)]);
    }
    self.send(req, "GET /properties").await
  }

  /// `GET /api/scheduled-properties`
  pub async fn scheduled(&self) -> Result<Vec<ScheduledProperty>> {
    self
      .send(self.client.get(self.url("/scheduled-properties")), "GET /scheduled-properties")
      .await
  }

  /// `GET /api/bookings[?property_id=<id>]`
  pub async fn bookings(&self, property_id: Option<&str>) -> Result<Vec<Booking>> {
    let mut req = self.client.get(self.url("/bookings"));
    if let Some(property_id) = property_id {
      req = req.query(&[("property_id", property_id)]);
    }
    self.send(req, "GET /bookings").await
  }

  /// Every row of `table`, exactly as the API serialises it.
  pub async fn export_rows(&self, table: ExportTable) -> Result<Vec<Value>> {
    let what = format!("GET {}", table.path());
    self.send(self.client.get(self.url(table.path())), &what).await
  }

  // ── Scheduler ─────────────────────────────────────────────────────────────

  /// `GET /api/scheduler-status`
  pub async fn scheduler_status(&self) -> Result<SchedulerSnapshot> {
    self
      .send(self.client.get(self.url("/scheduler-status")), "GET /scheduler-status")
      .await
  }

  /// `POST /api/fetch-now`
  pub async fn fetch_now(&self) -> Result<()> {
    let resp = self
      .client
      .post(self.url("/fetch-now"))
      .send()
      .await
      .context("POST /fetch-now failed")?;
    check(resp, "POST /fetch-now").await.map(drop)
  }
}

/// Turn a non-2xx response into an error carrying the API's message.
async fn check(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = resp
    .json::<Value>()
    .await
    .ok()
    .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_owned))
    .unwrap_or_default();
  Err(anyhow!("{what} → {status} {message}"))
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
  };

  use super::*;

  fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(ApiConfig { base_url: format!("{}/", server.uri()) }).unwrap()
  }

  #[tokio::test]
  async fn session_status_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/session-status"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "session": {"isValid": true, "lastLogin": null, "userEmail": "agent@example.com", "createdAt": null}
      })))
      .mount(&server)
      .await;

    let session = client(&server).session_status().await.unwrap();
    assert!(session.is_valid);
    assert_eq!(session.user_email.as_deref(), Some("agent@example.com"));
  }

  #[tokio::test]
  async fn filters_are_sent_as_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/showing-requests"))
      .and(query_param("status", "resolved"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .expect(1)
      .mount(&server)
      .await;

    let requests = client(&server).showing_requests(Some("resolved")).await.unwrap();
    assert!(requests.is_empty());
  }

  #[tokio::test]
  async fn api_errors_carry_the_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/fetch-now"))
      .respond_with(
        ResponseTemplate::new(503)
          .set_body_json(json!({"success": false, "error": "scheduler is not running"})),
      )
      .mount(&server)
      .await;

    let err = client(&server).fetch_now().await.unwrap_err();
    assert!(err.to_string().contains("scheduler is not running"), "{err}");
  }

  #[tokio::test]
  async fn export_fetches_the_unfiltered_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/bookings"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": 1, "propertyId": "p1", "status": "confirmed", "extra": {"kept": true}},
        {"id": 2, "propertyId": "p2", "status": "failed"},
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let rows = client(&server).export_rows(ExportTable::Bookings).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["extra"]["kept"], json!(true));

    let mut buf = Vec::new();
    crate::export::write_json_lines(&mut buf, &rows).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 2);
  }

  #[tokio::test]
  async fn export_surfaces_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/properties"))
      .respond_with(ResponseTemplate::new(500).set_body_json(json!({"success": false, "error": "store error: disk full"})))
      .mount(&server)
      .await;

    let err = client(&server).export_rows(ExportTable::Properties).await.unwrap_err();
    assert!(err.to_string().contains("disk full"), "{err}");
  }
}
