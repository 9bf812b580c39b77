use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use auth_cell::router::auth_routes;
use booking_cell::router::{booking_routes, BookingState};
use booking_cell::services::HttpLogSink;
use booking_cell::{BookingService, BookingStore};
use payment_cell::router::payment_routes;
use payment_cell::RazorpayGateway;
use shared_config::AppConfig;
use therapist_cell::router::{therapist_routes, TherapistState};
use therapist_cell::TherapistCatalog;

pub fn create_router(config: Arc<AppConfig>) -> anyhow::Result<Router> {
    let catalog = TherapistCatalog::seeded()?;

    let bookings = BookingService::new(
        BookingStore::new(),
        catalog.clone(),
        Arc::new(RazorpayGateway::new(&config)),
        Arc::new(HttpLogSink::new(&config)),
    );

    let router = Router::new()
        .route("/", get(|| async { "Physiotherapy booking API is running!" }))
        .nest("/auth", auth_routes(config.clone()))
        .nest("/therapists", therapist_routes(TherapistState { config: config.clone(), catalog }))
        .nest("/bookings", booking_routes(BookingState { config: config.clone(), service: bookings }))
        .nest("/payments", payment_routes(config));

    Ok(router)
}
