use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::extractor::{bearer_token, extract_user};

use crate::services::ProfileService;

/// Joins the validated session with its profile row and stores the resulting
/// `AppUser` in the request extensions. Must run after `auth_middleware`.
pub async fn profile_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let session = extract_user(&request)?;
    let token = bearer_token(request.headers())?;

    let service = ProfileService::new(&config);
    let app_user = service.resolve_user(&session, &token).await;
    debug!("Resolved user {} with role {}", app_user.id, app_user.role);

    request.extensions_mut().insert(app_user);

    Ok(next.run(request).await)
}
