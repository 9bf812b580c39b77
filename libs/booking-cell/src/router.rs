use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use auth_cell::middleware::profile_middleware;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::BookingService;

#[derive(Clone)]
pub struct BookingState {
    pub config: Arc<AppConfig>,
    pub service: BookingService,
}

pub fn booking_routes(state: BookingState) -> Router {
    let config = state.config.clone();

    let flow_routes = Router::new()
        .route("/flow", get(handlers::get_flow))
        .route("/flow/start", post(handlers::start_flow))
        .route("/flow/reschedule/{booking_id}", post(handlers::start_reschedule))
        .route("/flow/submit", post(handlers::submit_booking))
        .route("/flow/payment/retry", post(handlers::retry_payment))
        .route("/flow/payment/outcome", post(handlers::payment_outcome))
        .route("/flow/close", post(handlers::close_flow));

    let booking_routes = Router::new()
        .route("/", get(handlers::my_bookings))
        .route("/all", get(handlers::all_bookings))
        .route("/dashboard", get(handlers::therapist_dashboard))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}/cancel", post(handlers::cancel_booking))
        .route("/{booking_id}/intake", get(handlers::get_intake).post(handlers::submit_intake));

    // Every booking operation needs a resolved profile
    Router::new()
        .merge(flow_routes)
        .merge(booking_routes)
        .layer(middleware::from_fn_with_state(config.clone(), profile_middleware))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
