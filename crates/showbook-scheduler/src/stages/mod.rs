//! The two fetch stages, run as `showbookd stage sync` and
//! `showbookd stage resolve`.
//!
//! Each stage is a short-lived process: it talks to its remote source over
//! HTTP, writes through the [`ShowingStore`](showbook_core::store::ShowingStore)
//! and exits 0 only if every item was handled.

pub mod resolve;
pub mod sync;

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::Result;

/// A remote JSON source with optional bearer-token auth.
#[derive(Debug, Clone)]
pub struct HttpSource {
  client:   Client,
  base_url: String,
  api_key:  Option<String>,
}

impl HttpSource {
  pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .user_agent(concat!("showbook/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client, base_url: base_url.into(), api_key })
  }

  /// `GET {base_url}{path}`; an empty `path` targets the base URL itself.
  pub(crate) fn get(&self, path: &str) -> RequestBuilder {
    let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
    let req = self.client.get(url);
    match &self.api_key {
      Some(key) => req.bearer_auth(key),
      None => req,
    }
  }
}

// ─── Lenient field decoding ──────────────────────────────────────────────────

/// Accept `"123"` or `123` for identifiers.
pub(crate) fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  match Value::deserialize(de)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
  }
}

/// Integers that listing sites often render as text: `"$899,000"`, `"1,250 sq ft"`.
pub(crate) fn lenient_i64<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Option::<Value>::deserialize(de)? {
    Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
    Some(Value::String(s)) => {
      let digits: String = s
        .chars()
        .take_while(|c| *c != '.')
        .filter(char::is_ascii_digit)
        .collect();
      digits.parse().ok()
    }
    _ => None,
  })
}

/// Decimals rendered as text: `"2.5 baths"`.
pub(crate) fn lenient_f64<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Option::<Value>::deserialize(de)? {
    Some(Value::Number(n)) => n.as_f64(),
    Some(Value::String(s)) => {
      let number: String = s
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
      number.parse().ok()
    }
    _ => None,
  })
}

/// Blank strings become `None`.
pub(crate) fn non_blank<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(
    Option::<String>::deserialize(de)?
      .map(|s| s.trim().to_owned())
      .filter(|s| !s.is_empty()),
  )
}

#[cfg(test)]
mod tests {
  use serde::Deserialize;

  use super::*;

  #[derive(Deserialize)]
  struct Listing {
    #[serde(deserialize_with = "string_or_number")]
    id:    String,
    #[serde(default, deserialize_with = "lenient_i64")]
    price: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    baths: Option<f64>,
    #[serde(default, deserialize_with = "non_blank")]
    note:  Option<String>,
  }

  #[test]
  fn decodes_text_rendered_numbers() {
    let l: Listing =
      serde_json::from_str(r#"{"id": 42, "price": "$899,000", "baths": "2.5 baths", "note": "  "}"#)
        .unwrap();
    assert_eq!(l.id, "42");
    assert_eq!(l.price, Some(899_000));
    assert_eq!(l.baths, Some(2.5));
    assert_eq!(l.note, None);
  }

  #[test]
  fn missing_and_garbage_numbers_are_none() {
    let l: Listing = serde_json::from_str(r#"{"id": "a1", "baths": "n/a"}"#).unwrap();
    assert_eq!(l.price, None);
    assert_eq!(l.baths, None);
  }
}
