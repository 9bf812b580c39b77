use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use shared_models::auth::AppUser;
use therapist_cell::Therapist;

use crate::models::{Booking, BookingError, BookingIntent, BookingStatus};
use crate::services::sink::{notify, BookingLogSink};
use crate::services::store::BookingLedger;

/// Turns a captured intent into a booking record. Runs under the store lock,
/// so it never awaits; the log sink is notified on a spawned task.
#[derive(Clone)]
pub struct BookingFinalizer {
    sink: Arc<dyn BookingLogSink>,
}

impl BookingFinalizer {
    pub fn new(sink: Arc<dyn BookingLogSink>) -> Self {
        Self { sink }
    }

    /// Appends one confirmed booking. Missing inputs make this a no-op.
    pub fn finalize(
        &self,
        ledger: &mut BookingLedger,
        intent: Option<&BookingIntent>,
        therapist: Option<&Therapist>,
        user: Option<&AppUser>,
        is_paid: bool,
    ) -> Option<Booking> {
        let (intent, therapist, user) = match (intent, therapist, user) {
            (Some(intent), Some(therapist), Some(user)) => (intent, therapist, user),
            _ => {
                warn!(
                    "Finalize skipped: intent present={}, therapist present={}, user present={}",
                    intent.is_some(),
                    therapist.is_some(),
                    user.is_some()
                );
                return None;
            }
        };

        let booking = Booking {
            id: next_booking_id(ledger, Utc::now().timestamp_millis(), therapist.id),
            user_id: user.id.clone(),
            patient_name: intent.patient_name.clone(),
            patient_email: user.email.clone(),
            therapist: therapist.clone(),
            date: intent.date,
            time: intent.time,
            status: BookingStatus::Confirmed,
            phone_no: intent.phone_no.clone(),
            service: intent.service.clone(),
            is_paid,
            intake_form: None,
        };

        ledger.bookings.push(booking.clone());
        ledger.sort();
        info!("Booking {} confirmed for user {} (paid: {})", booking.id, user.id, is_paid);

        notify(self.sink.clone(), &booking);
        Some(booking)
    }

    /// Moves an existing booking to the new slot, keeping its id, owner and payment flag.
    pub fn reschedule(
        &self,
        ledger: &mut BookingLedger,
        booking_id: &str,
        intent: &BookingIntent,
    ) -> Result<Booking, BookingError> {
        let booking = ledger.find_mut(booking_id).ok_or(BookingError::NotFound)?;
        if booking.is_cancelled() {
            return Err(BookingError::AlreadyCancelled);
        }

        booking.date = intent.date;
        booking.time = intent.time;
        booking.status = BookingStatus::Confirmed;
        booking.phone_no = intent.phone_no.clone();
        booking.service = intent.service.clone();
        let updated = booking.clone();

        ledger.sort();
        info!("Booking {} rescheduled to {} {}", updated.id, updated.date, updated.time);
        Ok(updated)
    }
}

/// `<millis>-<therapistId>`, bumped past any id already taken.
fn next_booking_id(ledger: &BookingLedger, mut millis: i64, therapist_id: i64) -> String {
    loop {
        let id = format!("{}-{}", millis, therapist_id);
        if ledger.find(&id).is_none() {
            return id;
        }
        millis += 1;
    }
}
