use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "INR";
pub const MERCHANT_NAME: &str = "BookMyPhysiotherapy";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

// ==============================================================================
// ORDER MODELS
// ==============================================================================

/// Amount is in rupees; the gateway receives paise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrder {
    pub id: String,
    /// Paise.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RazorpayErrorEnvelope {
    pub error: RazorpayErrorDetails,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RazorpayErrorDetails {
    pub code: Option<String>,
    pub description: Option<String>,
}

// ==============================================================================
// VERIFICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ==============================================================================
// CHECKOUT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutPrefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutNotes {
    pub therapist_id: i64,
    pub booking_date: String,
}

/// Options handed to the client-side checkout widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutConfig {
    pub key: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub prefill: CheckoutPrefill,
    pub notes: CheckoutNotes,
}

impl CheckoutConfig {
    pub fn for_appointment(
        key_id: &str,
        order: &PaymentOrder,
        therapist_id: i64,
        therapist_name: &str,
        booking_date: &str,
        patient_name: &str,
        patient_email: Option<&str>,
    ) -> Self {
        Self {
            key: key_id.to_string(),
            amount: order.amount,
            currency: order.currency.clone(),
            name: MERCHANT_NAME.to_string(),
            description: format!("Appointment with {}", therapist_name),
            order_id: order.id.clone(),
            prefill: CheckoutPrefill {
                name: patient_name.to_string(),
                email: patient_email.unwrap_or_default().to_string(),
                contact: String::new(),
            },
            notes: CheckoutNotes {
                therapist_id,
                booking_date: booking_date.to_string(),
            },
        }
    }
}

/// What the checkout widget reported back for an attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Success {
        payment_id: String,
        signature: String,
    },
    Failed {
        #[serde(default)]
        description: Option<String>,
    },
    Dismissed,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaymentError {
    #[error("Network Error: could not reach the payment service ({0})")]
    Network(String),

    #[error("{0}")]
    OrderRejected(String),

    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    GatewayFailure(String),

    #[error("Payment cancelled by user.")]
    Cancelled,

    #[error("Payment successful but verification failed: {reason}. Please contact support with Payment ID: {payment_id}")]
    VerificationFailed { payment_id: String, reason: String },
}

impl PaymentError {
    /// Verification failures are surfaced, never retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PaymentError::VerificationFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_request_defaults_currency() {
        let request: CreateOrderRequest = serde_json::from_value(json!({ "amount": 800 })).unwrap();
        assert_eq!(request.currency, "INR");
        assert_eq!(request.receipt, None);
    }

    #[test]
    fn test_checkout_outcome_wire_format() {
        let outcome: CheckoutOutcome = serde_json::from_value(json!({
            "outcome": "success",
            "payment_id": "pay_123",
            "signature": "abc"
        }))
        .unwrap();
        assert_eq!(
            outcome,
            CheckoutOutcome::Success { payment_id: "pay_123".to_string(), signature: "abc".to_string() }
        );

        let dismissed: CheckoutOutcome = serde_json::from_value(json!({ "outcome": "dismissed" })).unwrap();
        assert_eq!(dismissed, CheckoutOutcome::Dismissed);
    }

    #[test]
    fn test_checkout_config_for_appointment() {
        let order = PaymentOrder {
            id: "order_1".to_string(),
            amount: 80000,
            currency: "INR".to_string(),
            receipt: None,
            status: None,
        };

        let config = CheckoutConfig::for_appointment(
            "rzp_test", &order, 2, "Dr. Shilpa Rangari", "2025-03-10", "Asha", None,
        );

        assert_eq!(config.description, "Appointment with Dr. Shilpa Rangari");
        assert_eq!(config.amount, 80000);
        assert_eq!(config.prefill.email, "");
        assert_eq!(config.notes.booking_date, "2025-03-10");
    }

    #[test]
    fn test_verification_failure_is_not_retryable() {
        let err = PaymentError::VerificationFailed {
            payment_id: "pay_9".to_string(),
            reason: "signature mismatch".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("pay_9"));
        assert!(PaymentError::Cancelled.is_retryable());
    }
}
