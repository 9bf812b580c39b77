use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::{Local, NaiveDate};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::AppUser;
use shared_models::error::AppError;

use crate::models::{
    Booking, BookingError, BookingView, BookingsOverview, IntakeForm, PaymentOutcomeRequest,
    StartFlowRequest, SubmitBookingRequest, TherapistDashboard,
};
use crate::router::BookingState;
use crate::services::FlowView;

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::ValidationError(msg) => AppError::ValidationError(msg),
            BookingError::NotFound | BookingError::TherapistNotFound | BookingError::IntakeNotFound => {
                AppError::NotFound(err.to_string())
            }
            BookingError::Unauthorized => AppError::Forbidden(err.to_string()),
            BookingError::AlreadyCancelled
            | BookingError::IntakeAlreadySubmitted
            | BookingError::InvalidTransition { .. }
            | BookingError::StaleAttempt(_)
            | BookingError::PaymentNotApplied { .. } => AppError::Conflict(err.to_string()),
            BookingError::Payment(e) => AppError::BadRequest(e.to_string()),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ==============================================================================
// BOOKING FLOW HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_flow(
    State(state): State<BookingState>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<FlowView>, AppError> {
    Ok(Json(state.service.current_flow(&user).await))
}

#[axum::debug_handler]
pub async fn start_flow(
    State(state): State<BookingState>,
    Extension(user): Extension<AppUser>,
    Json(request): Json<StartFlowRequest>,
) -> Result<Json<FlowView>, AppError> {
    let view = state.service.start(&user, request.therapist_id).await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn start_reschedule(
    State(state): State<BookingState>,
    Path(booking_id): Path<String>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<FlowView>, AppError> {
    debug!("User {} rescheduling booking {}", user.id, booking_id);
    let view = state.service.start_reschedule(&user, &booking_id).await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn submit_booking(
    State(state): State<BookingState>,
    Extension(user): Extension<AppUser>,
    Json(request): Json<SubmitBookingRequest>,
) -> Result<Json<FlowView>, AppError> {
    let view = state.service.submit(&user, request).await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn retry_payment(
    State(state): State<BookingState>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<FlowView>, AppError> {
    let view = state.service.retry_payment(&user).await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn payment_outcome(
    State(state): State<BookingState>,
    Extension(user): Extension<AppUser>,
    Json(request): Json<PaymentOutcomeRequest>,
) -> Result<Json<FlowView>, AppError> {
    let view = state
        .service
        .payment_outcome(&user, request.attempt, request.outcome)
        .await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn close_flow(
    State(state): State<BookingState>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<FlowView>, AppError> {
    let view = state.service.close(&user).await?;
    Ok(Json(view))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn my_bookings(
    State(state): State<BookingState>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<BookingsOverview>, AppError> {
    Ok(Json(state.service.overview(&user, today()).await))
}

#[axum::debug_handler]
pub async fn all_bookings(
    State(state): State<BookingState>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<Value>, AppError> {
    let bookings: Vec<BookingView> = state.service.all_bookings(&user, today()).await?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len()
    })))
}

#[axum::debug_handler]
pub async fn therapist_dashboard(
    State(state): State<BookingState>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<TherapistDashboard>, AppError> {
    let dashboard = state.service.therapist_dashboard(&user, today()).await?;
    Ok(Json(dashboard))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<BookingState>,
    Path(booking_id): Path<String>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<BookingView>, AppError> {
    let booking = state.service.get(&user, &booking_id).await?;
    Ok(Json(BookingView::new(booking, today())))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<BookingState>,
    Path(booking_id): Path<String>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.cancel(&user, &booking_id).await?;
    Ok(Json(booking))
}

#[axum::debug_handler]
pub async fn submit_intake(
    State(state): State<BookingState>,
    Path(booking_id): Path<String>,
    Extension(user): Extension<AppUser>,
    Json(form): Json<IntakeForm>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.submit_intake(&user, &booking_id, form).await?;
    Ok(Json(booking))
}

#[axum::debug_handler]
pub async fn get_intake(
    State(state): State<BookingState>,
    Path(booking_id): Path<String>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<IntakeForm>, AppError> {
    let form = state.service.get_intake(&user, &booking_id).await?;
    Ok(Json(form))
}
