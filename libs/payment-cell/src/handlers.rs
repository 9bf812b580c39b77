use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use chrono::Utc;
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateOrderRequest, PaymentOrder, VerifyPaymentRequest, VerifyPaymentResponse};
use crate::services::razorpay::{receipt_for, RazorpayClient};
use crate::services::{PaymentGateway, RazorpayGateway};

/// Order creation and verification both answer failures with `400 { error }`.
fn payment_error(err: crate::models::PaymentError) -> AppError {
    AppError::BadRequest(err.to_string())
}

#[axum::debug_handler]
pub async fn create_order(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<PaymentOrder>, AppError> {
    debug!("Creating payment order for user {}", user.id);

    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(AppError::BadRequest("Invalid amount".to_string()));
    }

    let receipt = request
        .receipt
        .clone()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| receipt_for(Utc::now().timestamp_millis()));

    let client = RazorpayClient::new(&config);
    let order = client
        .create_order(request.amount, &request.currency, &receipt)
        .await
        .map_err(payment_error)?;

    Ok(Json(order))
}

#[axum::debug_handler]
pub async fn verify_payment(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    if request.order_id.is_empty() || request.payment_id.is_empty() || request.signature.is_empty() {
        return Err(AppError::BadRequest("order_id, payment_id and signature are required".to_string()));
    }

    let gateway = RazorpayGateway::new(&config);
    let result = gateway
        .verify_payment(&request.order_id, &request.payment_id, &request.signature)
        .await
        .map_err(payment_error)?;

    Ok(Json(result))
}
