//! Viewing time slots.
//!
//! Remote requests carry free-form times ("2:30 PM", "14h30"); bookings need
//! a concrete `NaiveTime`. When a request has no time at all, the booking
//! stage falls back to the first slot of a generated viewing schedule.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// First bookable hour of the day.
pub const FIRST_HOUR: u32 = 9;
/// Last bookable hour of the day (only the `:00` slot).
pub const LAST_HOUR: u32 = 17;

static TIME_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
  [
    Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*(AM|PM)").expect("static regex"),
    Regex::new(r"(?i)(\d{1,2})\s*(AM|PM)").expect("static regex"),
    Regex::new(r"(\d{1,2}):(\d{2})").expect("static regex"),
    Regex::new(r"(\d{1,2})h(\d{2})").expect("static regex"),
  ]
});

fn to_24h(hour: u32, period: &str) -> u32 {
  match (period.to_ascii_uppercase().as_str(), hour) {
    ("PM", h) if h != 12 => h + 12,
    ("AM", 12) => 0,
    (_, h) => h,
  }
}

/// Parse a free-form time of day.
///
/// Accepts `2:30 PM`, `2 PM`, `14:30` and `14h30`, optionally embedded in
/// other text (`"Tue 2:30 PM - available"`).
pub fn parse_time_slot(text: &str) -> Option<NaiveTime> {
  let [hm_period, h_period, hm, h_suffix] = &*TIME_PATTERNS;

  if let Some(c) = hm_period.captures(text) {
    let hour = to_24h(c[1].parse().ok()?, &c[3]);
    return NaiveTime::from_hms_opt(hour, c[2].parse().ok()?, 0);
  }
  if let Some(c) = h_period.captures(text) {
    let hour = to_24h(c[1].parse().ok()?, &c[2]);
    return NaiveTime::from_hms_opt(hour, 0, 0);
  }
  let c = hm.captures(text).or_else(|| h_suffix.captures(text))?;
  NaiveTime::from_hms_opt(c[1].parse().ok()?, c[2].parse().ok()?, 0)
}

/// `9:00 AM` style label.
pub fn display_time(time: NaiveTime) -> String {
  let (pm, hour) = time.hour12();
  format!(
    "{hour}:{:02} {}",
    time.minute(),
    if pm { "PM" } else { "AM" }
  )
}

/// One bookable half-hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
  pub time:      NaiveTime,
  pub display:   String,
  pub available: bool,
}

/// All slots for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
  pub date:  NaiveDate,
  pub day:   Weekday,
  pub slots: Vec<TimeSlot>,
}

/// Standard slots: every 30 minutes from 09:00 through 17:00 inclusive.
pub fn daily_slots() -> Vec<TimeSlot> {
  (FIRST_HOUR..=LAST_HOUR)
    .flat_map(|h| [(h, 0), (h, 30)])
    .filter(|&(h, m)| h < LAST_HOUR || m == 0)
    .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
    .map(|time| TimeSlot { time, display: display_time(time), available: true })
    .collect()
}

/// `days` consecutive days of standard slots starting at `start`.
pub fn viewing_schedule(start: NaiveDate, days: u32) -> Vec<DaySchedule> {
  (0..days)
    .filter_map(|i| start.checked_add_signed(Duration::days(i64::from(i))))
    .map(|date| DaySchedule { date, day: date.weekday(), slots: daily_slots() })
    .collect()
}
