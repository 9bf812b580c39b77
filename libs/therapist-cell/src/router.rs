use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use auth_cell::middleware::profile_middleware;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::TherapistCatalog;

#[derive(Clone)]
pub struct TherapistState {
    pub config: Arc<AppConfig>,
    pub catalog: TherapistCatalog,
}

pub fn therapist_routes(state: TherapistState) -> Router {
    let config = state.config.clone();

    // Browsing needs no session
    let public_routes = Router::new()
        .route("/", get(handlers::search_therapists))
        .route("/featured", get(handlers::featured_therapists))
        .route("/{therapist_id}", get(handlers::get_therapist));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_therapist))
        .route("/{therapist_id}", put(handlers::update_therapist).delete(handlers::delete_therapist))
        .layer(middleware::from_fn_with_state(config.clone(), profile_middleware))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
