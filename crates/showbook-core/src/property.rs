//! Property records produced by address resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{address::parse_address, request::ShowingRequest};

/// A property row. Every attribute except the id is optional until the
/// resolver learns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
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
  pub updated_at:     DateTime<Utc>,
}

impl Property {
  pub fn is_resolved(&self) -> bool {
    self.address.as_deref().is_some_and(|a| !a.trim().is_empty())
  }
}

/// Input to `upsert_property`.
///
/// `None` means "unknown", never "clear": the store merges field by field and
/// keeps the stored value wherever the record is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
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
}

impl PropertyRecord {
  pub fn new(property_id: impl Into<String>) -> Self {
    Self { property_id: property_id.into(), ..Self::default() }
  }

  /// Set the address and fill city, province and postal code from it where
  /// they are not already known.
  pub fn with_address(mut self, address: impl Into<String>) -> Self {
    let address = address.into();
    let trimmed = address.trim();
    if trimmed.is_empty() {
      return self;
    }

    let parts = parse_address(trimmed);
    self.city = self.city.or(parts.city);
    self.province = self.province.or(parts.province);
    self.postal_code = self.postal_code.or(parts.postal_code);
    self.address = Some(trimmed.to_owned());
    self
  }
}

/// A property paired with the open showing request that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledProperty {
  pub property: Property,
  pub request:  ShowingRequest,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn with_address_derives_components() {
    let record = PropertyRecord::new("p1")
      .with_address("10 Navy Wharf Court #3209, Toronto, ON M5V 3V2");
    assert_eq!(record.city.as_deref(), Some("Toronto"));
    assert_eq!(record.province.as_deref(), Some("ON"));
    assert_eq!(record.postal_code.as_deref(), Some("M5V 3V2"));
  }

  #[test]
  fn blank_address_is_ignored() {
    let record = PropertyRecord::new("p1").with_address("   ");
    assert_eq!(record.address, None);
  }
}
