use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{PaymentOrder, PaymentError, RazorpayErrorEnvelope};

type HmacSha256 = Hmac<Sha256>;

const RECEIPT_MAX_LEN: usize = 40;
const ORDER_FAILED_FALLBACK: &str = "Failed to create order with Razorpay";

/// Minimal Razorpay Orders client built on reqwest.
pub struct RazorpayClient {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl RazorpayClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
            base_url: config.razorpay_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    fn ensure_keys(&self) -> Result<(), PaymentError> {
        if self.key_id.is_empty() || self.key_secret.is_empty() {
            return Err(PaymentError::NotConfigured(
                "Razorpay keys (RAZORPAY_KEY_ID or RAZORPAY_KEY_SECRET) are missing".to_string(),
            ));
        }
        Ok(())
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (code, description) = match serde_json::from_str::<RazorpayErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.code, envelope.error.description),
            Err(_) => (None, None),
        };

        error!(
            status = %status,
            razorpay_error_code = ?code,
            razorpay_error_description = ?description,
            response_body = %body,
            "razorpay order creation failed"
        );

        Err(PaymentError::OrderRejected(
            description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| ORDER_FAILED_FALLBACK.to_string()),
        ))
    }

    /// Creates an order for `amount` rupees. https://razorpay.com/docs/api/orders/create
    pub async fn create_order(
        &self,
        amount: f64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentOrder, PaymentError> {
        self.ensure_keys()?;

        let body = json!({
            "amount": to_paise(amount),
            "currency": currency,
            "receipt": receipt,
        });
        debug!("Creating Razorpay order: {}", body);

        let resp = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Razorpay unreachable: {}", e);
                PaymentError::Network(e.to_string())
            })?;

        let resp = Self::ensure_success(resp).await?;

        let order: PaymentOrder = resp
            .json()
            .await
            .map_err(|e| PaymentError::OrderRejected(format!("Invalid order received from server: {}", e)))?;

        if order.id.is_empty() {
            return Err(PaymentError::OrderRejected(
                "Invalid order received from server. Order ID is missing.".to_string(),
            ));
        }

        info!("Razorpay order {} created for {} {}", order.id, order.amount, order.currency);
        Ok(order)
    }

    /// Checks the checkout signature in constant time.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, PaymentError> {
        self.ensure_keys()?;

        let provided = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };

        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .map_err(|e| PaymentError::GatewayFailure(e.to_string()))?;
        mac.update(signature_payload(order_id, payment_id).as_bytes());

        Ok(mac.verify_slice(&provided).is_ok())
    }
}

fn signature_payload(order_id: &str, payment_id: &str) -> String {
    format!("{}|{}", order_id, payment_id)
}

/// Hex HMAC-SHA256 of `order_id|payment_id`, as the checkout widget signs it.
pub fn expected_signature(key_secret: &str, order_id: &str, payment_id: &str) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|e| PaymentError::GatewayFailure(e.to_string()))?;
    mac.update(signature_payload(order_id, payment_id).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn to_paise(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn receipt_for(millis: i64) -> String {
    let mut receipt = format!("receipt_{}", millis);
    receipt.truncate(RECEIPT_MAX_LEN);
    receipt
}
