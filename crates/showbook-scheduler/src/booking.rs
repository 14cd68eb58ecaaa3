//! Booking a showing for a resolved request.
//!
//! The browser automation lives outside this crate. [`CommandBookingExecutor`]
//! runs it as a child process and reads its verdict from the last JSON line
//! it prints; [`book_showing`] wraps that in the session, address and slot
//! checks and records the attempt.

use std::future::Future;

use chrono::{NaiveDate, NaiveTime};
use showbook_core::{
  booking::{Booking, BookingOutcome, BookingSlot, NewBooking, Requester},
  command::CommandSpec,
  request::RequestStatus,
  session::SessionProvider,
  slot::viewing_schedule,
  store::ShowingStore,
};

use crate::{Error, Result, runner::StageRunner};

/// Days of standard slots considered when a request has no preferred time.
pub const SCHEDULE_DAYS: u32 = 7;

/// Performs one booking attempt. Never fails: problems become a
/// [`BookingOutcome`] with status `failed`.
pub trait BookingExecutor: Send + Sync {
  fn execute<'a>(
    &'a self,
    slot: &'a BookingSlot,
    requester: &'a Requester,
  ) -> impl Future<Output = BookingOutcome> + Send + 'a;
}

/// Runs the configured booking automation as a child process.
#[derive(Debug, Clone)]
pub struct CommandBookingExecutor {
  command: CommandSpec,
  runner:  StageRunner,
}

impl CommandBookingExecutor {
  pub fn new(command: CommandSpec) -> Self {
    Self { command, runner: StageRunner::default() }
  }

  fn command_for(&self, slot: &BookingSlot, requester: &Requester) -> CommandSpec {
    let mut spec = self.command.clone().args([
      "--property-id".to_owned(),
      slot.property_id.clone(),
      "--address".to_owned(),
      slot.address.clone(),
      "--date".to_owned(),
      slot.date.format("%Y-%m-%d").to_string(),
      "--time".to_owned(),
      slot.time.format("%H:%M").to_string(),
      "--duration".to_owned(),
      slot.duration_minutes.to_string(),
      "--name".to_owned(),
      requester.name.clone(),
      "--email".to_owned(),
      requester.email.clone(),
    ]);
    if let Some(phone) = &requester.phone {
      spec = spec.arg("--phone").arg(phone.clone());
    }
    if let Some(message) = &requester.message {
      spec = spec.arg("--message").arg(message.clone());
    }
    spec
  }
}

impl BookingExecutor for CommandBookingExecutor {
  async fn execute(&self, slot: &BookingSlot, requester: &Requester) -> BookingOutcome {
    let result = self.runner.run("booking", &self.command_for(slot, requester)).await;
    if !result.success {
      return BookingOutcome::failed(result.output.trim());
    }
    match last_json_line(&result.output) {
      Some(outcome) => outcome,
      None => {
        tracing::warn!(property = %slot.property_id, "booking command printed no result line");
        BookingOutcome::failed(format!("no booking result in output: {}", result.output.trim()))
      }
    }
  }
}

fn last_json_line(output: &str) -> Option<BookingOutcome> {
  output
    .lines()
    .rev()
    .map(str::trim)
    .filter(|line| line.starts_with('{'))
    .find_map(|line| serde_json::from_str(line).ok())
}

/// What `book_showing` should book.
#[derive(Debug, Clone)]
pub struct BookingRequest {
  pub request_id:       String,
  pub requester:        Requester,
  /// Overrides the request's own date.
  pub date:             Option<NaiveDate>,
  /// Overrides the request's own time.
  pub time:             Option<NaiveTime>,
  pub duration_minutes: u32,
}

/// Book a showing for one request and record the attempt.
///
/// Refuses without a valid session or without a known property address.
/// Otherwise always appends a booking row, and moves the request to `booked`
/// or `failed` according to the outcome.
pub async fn book_showing<S, P, E>(
  store: &S,
  session: &P,
  executor: &E,
  booking: BookingRequest,
  today: NaiveDate,
) -> Result<Booking>
where
  S: ShowingStore,
  P: SessionProvider,
  E: BookingExecutor,
{
  if !session.is_session_valid().await.map_err(Error::session)? {
    return Err(Error::SessionInvalid);
  }

  let request = store
    .get_showing_request(&booking.request_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::RequestNotFound(booking.request_id.clone()))?;
  if request.status == RequestStatus::Booked {
    return Err(Error::AlreadyBooked(request.request_id));
  }

  let address = store
    .get_property(&request.property_id)
    .await
    .map_err(Error::store)?
    .and_then(|p| p.address.filter(|a| !a.trim().is_empty()))
    .ok_or_else(|| Error::AddressUnknown(request.property_id.clone()))?;

  let (date, time) = choose_slot(
    booking.date.or(request.requested_date),
    booking.time.or(request.requested_time),
    today,
  )
  .ok_or(Error::NoSlot)?;

  let slot = BookingSlot {
    property_id: request.property_id.clone(),
    request_id: Some(request.request_id.clone()),
    address,
    date,
    time,
    duration_minutes: booking.duration_minutes,
  };

  tracing::info!(
    request = %request.request_id,
    property = %slot.property_id,
    %date,
    %time,
    "booking showing"
  );
  let outcome = executor.execute(&slot, &booking.requester).await;

  let record = store
    .insert_booking(NewBooking::from_outcome(slot, booking.requester, outcome))
    .await
    .map_err(Error::store)?;
  store
    .set_request_status(&request.request_id, record.status.request_status())
    .await
    .map_err(Error::store)?;

  tracing::info!(
    request = %request.request_id,
    booking = record.id,
    status = %record.status,
    auto_confirmed = record.auto_confirmed,
    "booking recorded"
  );
  Ok(record)
}

/// The requested date and time, with gaps filled from the first slot of the
/// standard viewing schedule.
fn choose_slot(
  date: Option<NaiveDate>,
  time: Option<NaiveTime>,
  today: NaiveDate,
) -> Option<(NaiveDate, NaiveTime)> {
  if let (Some(date), Some(time)) = (date, time) {
    return Some((date, time));
  }
  let schedule = viewing_schedule(date.unwrap_or(today), SCHEDULE_DAYS);
  let (first_date, first_time) = schedule
    .iter()
    .find_map(|day| day.slots.iter().find(|s| s.available).map(|s| (day.date, s.time)))?;
  Some((date.unwrap_or(first_date), time.unwrap_or(first_time)))
}
