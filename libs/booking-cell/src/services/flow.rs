use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use payment_cell::{CheckoutConfig, PaymentError};
use therapist_cell::Therapist;

use crate::models::{Booking, BookingError, BookingIntent};

/// What the open booking form is for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowTarget {
    pub therapist: Therapist,
    /// Booking being rescheduled, if any.
    pub reschedule_of: Option<String>,
}

impl FlowTarget {
    pub fn is_rescheduling(&self) -> bool {
        self.reschedule_of.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentFailure {
    pub message: String,
    pub payment_id: Option<String>,
    pub retry_allowed: bool,
}

impl From<&PaymentError> for PaymentFailure {
    fn from(err: &PaymentError) -> Self {
        let payment_id = match err {
            PaymentError::VerificationFailed { payment_id, .. } => Some(payment_id.clone()),
            _ => None,
        };

        Self {
            message: err.to_string(),
            payment_id,
            retry_allowed: err.is_retryable(),
        }
    }
}

/// Booking flow states. The pending intent only exists in the states that
/// are waiting on it, so leaving them clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Idle,
    Composing {
        target: FlowTarget,
    },
    IntentCaptured {
        target: FlowTarget,
        intent: BookingIntent,
    },
    PaymentPending {
        target: FlowTarget,
        intent: BookingIntent,
        attempt: u32,
        checkout: Option<CheckoutConfig>,
        failure: Option<PaymentFailure>,
    },
    PaymentVerifying {
        target: FlowTarget,
        intent: BookingIntent,
        attempt: u32,
        order_id: String,
        payment_id: String,
    },
    Finalized {
        booking: Booking,
        paid_online: bool,
        rescheduled: bool,
    },
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::Composing { .. } => "composing",
            FlowState::IntentCaptured { .. } => "intent_captured",
            FlowState::PaymentPending { .. } => "payment_pending",
            FlowState::PaymentVerifying { .. } => "payment_verifying",
            FlowState::Finalized { .. } => "finalized",
        }
    }

    /// The target and intent held while a booking awaits finalization.
    pub fn pending(&self) -> Option<(&FlowTarget, &BookingIntent)> {
        match self {
            FlowState::IntentCaptured { target, intent }
            | FlowState::PaymentPending { target, intent, .. }
            | FlowState::PaymentVerifying { target, intent, .. } => Some((target, intent)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FlowAction {
    Open(FlowTarget),
    CaptureIntent(BookingIntent),
    BeginPayment,
    OrderCreated { attempt: u32, checkout: CheckoutConfig },
    BeginVerification { attempt: u32, payment_id: String },
    /// Reported by the client while a checkout is open.
    PaymentFailed { attempt: u32, failure: PaymentFailure },
    /// Server-side verification of a captured payment was rejected.
    VerificationFailed { attempt: u32, failure: PaymentFailure },
    /// `attempt` is `None` on the no-payment edge.
    Finalize { attempt: Option<u32>, booking: Booking, paid_online: bool },
    Close,
}

impl FlowAction {
    fn name(&self) -> &'static str {
        match self {
            FlowAction::Open(_) => "open the booking form",
            FlowAction::CaptureIntent(_) => "submit the booking form",
            FlowAction::BeginPayment => "start a payment",
            FlowAction::OrderCreated { .. } => "attach a payment order",
            FlowAction::BeginVerification { .. } => "verify a payment",
            FlowAction::PaymentFailed { .. } => "record a payment failure",
            FlowAction::VerificationFailed { .. } => "record a verification failure",
            FlowAction::Finalize { .. } => "finalize the booking",
            FlowAction::Close => "close the booking flow",
        }
    }
}

/// Per-user booking flow register. Attempt numbers keep increasing across
/// close and reopen so that late outcomes from an old attempt never match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingFlow {
    pub state: FlowState,
    pub last_attempt: u32,
    pub request_token: Option<String>,
}

impl BookingFlow {
    fn with_state(&self, state: FlowState) -> Self {
        Self {
            state,
            last_attempt: self.last_attempt,
            request_token: self.request_token.clone(),
        }
    }

    fn invalid(&self, action: &FlowAction) -> BookingError {
        warn!("Rejected transition: {} from {}", action.name(), self.state.name());
        BookingError::InvalidTransition {
            state: self.state.name().to_string(),
            action: action.name().to_string(),
        }
    }

    /// Computes the next flow without touching `self`.
    pub fn apply(&self, action: FlowAction) -> Result<BookingFlow, BookingError> {
        debug!("Applying '{}' to flow in {}", action.name(), self.state.name());

        match (&self.state, action) {
            (_, FlowAction::Close) => Ok(BookingFlow {
                state: FlowState::Idle,
                last_attempt: self.last_attempt,
                request_token: None,
            }),

            (FlowState::Idle | FlowState::Composing { .. } | FlowState::Finalized { .. }, FlowAction::Open(target)) => {
                Ok(BookingFlow {
                    state: FlowState::Composing { target },
                    last_attempt: self.last_attempt,
                    request_token: None,
                })
            }

            (FlowState::Composing { target }, FlowAction::CaptureIntent(intent)) => {
                Ok(self.with_state(FlowState::IntentCaptured { target: target.clone(), intent }))
            }

            (FlowState::IntentCaptured { target, intent }, FlowAction::BeginPayment)
                if !target.is_rescheduling() =>
            {
                Ok(self.next_attempt(target, intent))
            }

            (FlowState::PaymentPending { target, intent, failure, .. }, FlowAction::BeginPayment)
                if failure.as_ref().map_or(true, |f| f.retry_allowed) =>
            {
                Ok(self.next_attempt(target, intent))
            }

            (
                FlowState::PaymentPending { target, intent, attempt, checkout: None, failure: None },
                FlowAction::OrderCreated { attempt: reported, checkout },
            ) if *attempt == reported => Ok(self.with_state(FlowState::PaymentPending {
                target: target.clone(),
                intent: intent.clone(),
                attempt: *attempt,
                checkout: Some(checkout),
                failure: None,
            })),

            (
                FlowState::PaymentPending { target, intent, attempt, checkout: Some(checkout), .. },
                FlowAction::BeginVerification { attempt: reported, payment_id },
            ) if *attempt == reported => Ok(self.with_state(FlowState::PaymentVerifying {
                target: target.clone(),
                intent: intent.clone(),
                attempt: *attempt,
                order_id: checkout.order_id.clone(),
                payment_id,
            })),

            (
                FlowState::PaymentPending { target, intent, attempt, checkout, .. },
                FlowAction::PaymentFailed { attempt: reported, failure },
            ) if *attempt == reported => Ok(self.with_state(FlowState::PaymentPending {
                target: target.clone(),
                intent: intent.clone(),
                attempt: *attempt,
                checkout: checkout.clone(),
                failure: Some(failure),
            })),

            (
                FlowState::PaymentVerifying { target, intent, attempt, .. },
                FlowAction::VerificationFailed { attempt: reported, failure },
            ) if *attempt == reported => Ok(self.with_state(FlowState::PaymentPending {
                target: target.clone(),
                intent: intent.clone(),
                attempt: *attempt,
                checkout: None,
                failure: Some(failure),
            })),

            (FlowState::IntentCaptured { target, .. }, FlowAction::Finalize { attempt: None, booking, paid_online }) => {
                Ok(self.with_state(FlowState::Finalized {
                    booking,
                    paid_online,
                    rescheduled: target.is_rescheduling(),
                }))
            }

            (
                FlowState::PaymentVerifying { attempt, .. },
                FlowAction::Finalize { attempt: Some(reported), booking, paid_online },
            ) if *attempt == reported => Ok(self.with_state(FlowState::Finalized {
                booking,
                paid_online,
                rescheduled: false,
            })),

            (
                FlowState::PaymentPending { attempt, .. } | FlowState::PaymentVerifying { attempt, .. },
                FlowAction::OrderCreated { attempt: reported, .. }
                | FlowAction::BeginVerification { attempt: reported, .. }
                | FlowAction::PaymentFailed { attempt: reported, .. }
                | FlowAction::VerificationFailed { attempt: reported, .. }
                | FlowAction::Finalize { attempt: Some(reported), .. },
            ) if *attempt != reported => Err(BookingError::StaleAttempt(reported)),

            (
                FlowState::Idle | FlowState::Composing { .. } | FlowState::Finalized { .. },
                FlowAction::OrderCreated { attempt, .. }
                | FlowAction::BeginVerification { attempt, .. }
                | FlowAction::PaymentFailed { attempt, .. }
                | FlowAction::VerificationFailed { attempt, .. },
            ) => Err(BookingError::StaleAttempt(attempt)),

            (_, action) => Err(self.invalid(&action)),
        }
    }

    fn next_attempt(&self, target: &FlowTarget, intent: &BookingIntent) -> BookingFlow {
        let attempt = self.last_attempt + 1;
        BookingFlow {
            state: FlowState::PaymentPending {
                target: target.clone(),
                intent: intent.clone(),
                attempt,
                checkout: None,
                failure: None,
            },
            last_attempt: attempt,
            request_token: self.request_token.clone(),
        }
    }
}
