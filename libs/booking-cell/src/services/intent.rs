use chrono::NaiveDate;
use tracing::debug;

use crate::models::{BookingError, BookingIntent, SubmitBookingRequest, TimeSlot};

pub const MISSING_FIELDS: &str = "Please fill in all fields, and select a date and time.";
pub const INVALID_DATE: &str = "Invalid date selected. Please select again.";

/// Parses `YYYY-MM-DD` by calendar components so the day never shifts with the
/// server's offset from UTC.
pub fn parse_local_date(value: &str) -> Result<NaiveDate, BookingError> {
    let invalid = || BookingError::ValidationError(INVALID_DATE.to_string());

    let mut parts = value.trim().splitn(3, '-');
    let (year, month, day) = match (parts.next(), parts.next(), parts.next()) {
        (Some(y), Some(m), Some(d)) if y.len() == 4 && m.len() == 2 && d.len() == 2 => (y, m, d),
        _ => return Err(invalid()),
    };

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Turns a booking form submission into an intent. Any missing field or an
/// unparseable date or slot is a validation error.
pub fn capture_intent(request: &SubmitBookingRequest) -> Result<BookingIntent, BookingError> {
    let required = [
        &request.patient_name,
        &request.phone_no,
        &request.service,
        &request.date,
        &request.time,
    ];
    if required.iter().any(|value| value.trim().is_empty()) {
        return Err(BookingError::ValidationError(MISSING_FIELDS.to_string()));
    }

    let date = parse_local_date(&request.date)?;
    let time = TimeSlot::parse(&request.time)
        .ok_or_else(|| BookingError::ValidationError(MISSING_FIELDS.to_string()))?;

    debug!("Captured booking intent for {} at {}", date, time);

    Ok(BookingIntent {
        date,
        time,
        patient_name: request.patient_name.trim().to_string(),
        phone_no: request.phone_no.trim().to_string(),
        service: request.service.trim().to_string(),
    })
}
