use async_trait::async_trait;
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::{PaymentError, PaymentOrder, VerifyPaymentResponse};
use crate::services::razorpay::RazorpayClient;

/// Server half of the checkout: order creation and signature verification.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key the client-side widget is opened with.
    fn key_id(&self) -> &str;

    fn currency(&self) -> &str;

    async fn create_order(&self, amount: f64, receipt: &str) -> Result<PaymentOrder, PaymentError>;

    async fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<VerifyPaymentResponse, PaymentError>;
}

pub struct RazorpayGateway {
    client: RazorpayClient,
    currency: String,
}

impl RazorpayGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: RazorpayClient::new(config),
            currency: config.payment_currency.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        self.client.key_id()
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    async fn create_order(&self, amount: f64, receipt: &str) -> Result<PaymentOrder, PaymentError> {
        self.client.create_order(amount, &self.currency, receipt).await
    }

    async fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<VerifyPaymentResponse, PaymentError> {
        if self.client.verify_signature(order_id, payment_id, signature)? {
            info!("Payment {} verified for order {}", payment_id, order_id);
            Ok(VerifyPaymentResponse { success: true, message: None })
        } else {
            warn!("Signature mismatch for payment {} on order {}", payment_id, order_id);
            Ok(VerifyPaymentResponse {
                success: false,
                message: Some("Invalid payment signature".to_string()),
            })
        }
    }
}
