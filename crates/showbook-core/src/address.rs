//! Canadian street address splitting.
//!
//! Property sources hand back a single free-form address line. The store keeps
//! city, province and postal code in their own columns so the dashboard can
//! filter on them.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Two-letter province and territory codes with their full names.
pub const PROVINCES: &[(&str, &str)] = &[
  ("AB", "Alberta"),
  ("BC", "British Columbia"),
  ("MB", "Manitoba"),
  ("NB", "New Brunswick"),
  ("NL", "Newfoundland and Labrador"),
  ("NS", "Nova Scotia"),
  ("NT", "Northwest Territories"),
  ("NU", "Nunavut"),
  ("ON", "Ontario"),
  ("PE", "Prince Edward Island"),
  ("QC", "Quebec"),
  ("SK", "Saskatchewan"),
  ("YT", "Yukon"),
];

static POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)\b([A-Z]\d[A-Z])\s?(\d[A-Z]\d)\b").expect("static regex")
});

/// Components recovered from an address line. Missing parts are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
  pub street:      Option<String>,
  pub city:        Option<String>,
  pub province:    Option<String>,
  pub postal_code: Option<String>,
}

/// Full province name for a two-letter code.
pub fn province_name(code: &str) -> Option<&'static str> {
  PROVINCES
    .iter()
    .find(|(c, _)| c.eq_ignore_ascii_case(code))
    .map(|(_, name)| *name)
}

/// Split `text` into street, city, province and postal code.
///
/// Comma segments are read from the end. The first one that is a province
/// (code or full name), or ends with one, fixes the province; the city is
/// whatever precedes it in that segment, or else the segment before. The
/// street is everything earlier. Only when no segment qualifies is the whole
/// line scanned for a province word, and then no city or street is reported.
pub fn parse_address(text: &str) -> AddressParts {
  let text = text.trim();

  let postal_code = POSTAL_CODE
    .captures(text)
    .map(|c| format!("{} {}", c[1].to_uppercase(), c[2].to_uppercase()));

  let stripped = POSTAL_CODE.replace_all(text, "");
  let segments: Vec<&str> = stripped
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect();

  for (i, segment) in segments.iter().enumerate().rev() {
    let Some((code, rest)) = split_province(segment) else { continue };
    let (city, street_end) = if rest.is_empty() {
      (i.checked_sub(1).map(|j| segments[j]), i.saturating_sub(1))
    } else {
      (Some(rest), i)
    };
    let street = segments[..street_end].join(", ");
    return AddressParts {
      street: (!street.is_empty()).then_some(street),
      city: city.map(str::to_owned),
      province: Some(code.to_owned()),
      postal_code,
    };
  }

  AddressParts {
    province: scan_province(&stripped).map(str::to_owned),
    postal_code,
    ..AddressParts::default()
  }
}

/// Match a segment that is a province, or ends with one after whitespace.
/// Returns the code and the text before the province.
fn split_province(segment: &str) -> Option<(&'static str, &str)> {
  for (code, name) in PROVINCES {
    for label in [*code, *name] {
      if segment.eq_ignore_ascii_case(label) {
        return Some((*code, ""));
      }
      if let Some(split) = segment.len().checked_sub(label.len())
        && segment.is_char_boundary(split)
        && segment[split..].eq_ignore_ascii_case(label)
        && segment[..split].ends_with(char::is_whitespace)
      {
        return Some((*code, segment[..split].trim_end()));
      }
    }
  }
  None
}

/// Last-resort lookup: a full province name as whole words, or an
/// upper-case code standing alone.
fn scan_province(text: &str) -> Option<&'static str> {
  PROVINCES
    .iter()
    .find(|(_, name)| {
      Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name)))
        .is_ok_and(|re| re.is_match(text))
    })
    .or_else(|| {
      PROVINCES.iter().find(|(code, _)| {
        text
          .split(|c: char| !c.is_ascii_alphanumeric())
          .any(|token| token == *code)
      })
    })
    .map(|(code, _)| *code)
}
