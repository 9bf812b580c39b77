use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use payment_cell::{CheckoutOutcome, PaymentError};
use therapist_cell::Therapist;

// ==============================================================================
// BOOKING MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::CheckedIn => write!(f, "checked-in"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The fixed daily appointment slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeSlot {
    #[serde(rename = "09:00 AM")]
    NineAm,
    #[serde(rename = "10:00 AM")]
    TenAm,
    #[serde(rename = "11:00 AM")]
    ElevenAm,
    #[serde(rename = "02:00 PM")]
    TwoPm,
    #[serde(rename = "03:00 PM")]
    ThreePm,
    #[serde(rename = "04:00 PM")]
    FourPm,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 6] = [
        TimeSlot::NineAm,
        TimeSlot::TenAm,
        TimeSlot::ElevenAm,
        TimeSlot::TwoPm,
        TimeSlot::ThreePm,
        TimeSlot::FourPm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSlot::NineAm => "09:00 AM",
            TimeSlot::TenAm => "10:00 AM",
            TimeSlot::ElevenAm => "11:00 AM",
            TimeSlot::TwoPm => "02:00 PM",
            TimeSlot::ThreePm => "03:00 PM",
            TimeSlot::FourPm => "04:00 PM",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == value.trim())
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub therapist: Therapist,
    pub date: NaiveDate,
    pub time: TimeSlot,
    pub status: BookingStatus,
    pub phone_no: String,
    pub service: String,
    pub is_paid: bool,
    pub intake_form: Option<IntakeForm>,
}

impl Booking {
    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    /// Past bookings that were not cancelled read as completed.
    pub fn display_status(&self, today: NaiveDate) -> BookingStatus {
        if self.is_cancelled() {
            BookingStatus::Cancelled
        } else if self.date < today {
            BookingStatus::Completed
        } else {
            self.status
        }
    }

    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.date >= today && !self.is_cancelled()
    }
}

/// Validated form data, consumed once by the finalizer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingIntent {
    pub date: NaiveDate,
    pub time: TimeSlot,
    pub patient_name: String,
    pub phone_no: String,
    pub service: String,
}

// ==============================================================================
// INTAKE FORM
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    #[serde(rename = "Prefer not to say")]
    PreferNotToSay,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersonalInfo {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub gender: Gender,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicalHistory {
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub past_surgeries: String,
    #[serde(default)]
    pub chronic_conditions: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CurrentCondition {
    #[serde(default)]
    pub primary_complaint: String,
    #[serde(default)]
    pub symptoms: String,
    /// 1 to 10.
    pub pain_level: u8,
    #[serde(default)]
    pub onset: String,
    #[serde(default)]
    pub better_with: String,
    #[serde(default)]
    pub worse_with: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Goals {
    #[serde(default)]
    pub patient_goals: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntakeForm {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub medical_history: MedicalHistory,
    pub current_condition: CurrentCondition,
    pub goals: Goals,
}

impl IntakeForm {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.personal_info.full_name.trim().is_empty() || self.personal_info.dob.trim().is_empty() {
            return Err(BookingError::ValidationError(
                "Please fill in your Full Name and Date of Birth.".to_string(),
            ));
        }
        if self.current_condition.primary_complaint.trim().is_empty() {
            return Err(BookingError::ValidationError(
                "Please describe your primary complaint.".to_string(),
            ));
        }
        if !(1..=10).contains(&self.current_condition.pain_level) {
            return Err(BookingError::ValidationError(
                "Pain level must be between 1 and 10.".to_string(),
            ));
        }
        if self.goals.patient_goals.trim().is_empty() {
            return Err(BookingError::ValidationError(
                "Please describe your goals for physiotherapy.".to_string(),
            ));
        }
        Ok(())
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StartFlowRequest {
    pub therapist_id: i64,
}

/// Booking form submission. Fields are plain strings so that missing or
/// malformed values surface as validation errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitBookingRequest {
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub phone_no: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    pub request_token: Option<String>,
}

/// Checkout widget callback, tagged with the attempt it belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentOutcomeRequest {
    pub attempt: u32,
    #[serde(flatten)]
    pub outcome: CheckoutOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub display_status: BookingStatus,
}

impl BookingView {
    pub fn new(booking: Booking, today: NaiveDate) -> Self {
        let display_status = booking.display_status(today);
        Self { booking, display_status }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingsOverview {
    pub upcoming: Vec<BookingView>,
    pub history: Vec<BookingView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapistDashboard {
    pub therapist_id: i64,
    pub upcoming: Vec<BookingView>,
    pub total_patients: usize,
    pub total_bookings: usize,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Booking not found")]
    NotFound,

    #[error("Therapist not found")]
    TherapistNotFound,

    #[error("Not authorized to access this booking")]
    Unauthorized,

    #[error("Booking has been cancelled")]
    AlreadyCancelled,

    #[error("An intake form has already been submitted for this booking")]
    IntakeAlreadySubmitted,

    #[error("No intake form submitted for this booking")]
    IntakeNotFound,

    #[error("Cannot {action} while booking flow is {state}")]
    InvalidTransition { state: String, action: String },

    #[error("Payment attempt {0} is no longer current")]
    StaleAttempt(u32),

    #[error("Payment received but the booking was not completed. Please contact support with Payment ID: {payment_id}")]
    PaymentNotApplied { payment_id: String },

    #[error(transparent)]
    Payment(#[from] PaymentError),
}
