use therapist_cell::Therapist;

/// Online payment is taken only for new bookings at clinics that explicitly
/// accept it. A missing flag means pay at the visit.
pub fn requires_online_payment(therapist: &Therapist, is_rescheduling: bool) -> bool {
    !is_rescheduling && therapist.clinic.is_online_payment_available == Some(true)
}
