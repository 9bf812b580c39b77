use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use payment_cell::services::razorpay::receipt_for;
use payment_cell::{CheckoutConfig, CheckoutOutcome, PaymentError, PaymentGateway};
use shared_models::auth::AppUser;
use therapist_cell::{Therapist, TherapistCatalog, TherapistError};

use crate::models::{
    Booking, BookingError, BookingIntent, BookingStatus, BookingView, BookingsOverview,
    IntakeForm, SubmitBookingRequest, TherapistDashboard, TimeSlot,
};
use crate::services::finalizer::BookingFinalizer;
use crate::services::flow::{BookingFlow, FlowAction, FlowState, FlowTarget, PaymentFailure};
use crate::services::gate::requires_online_payment;
use crate::services::intent::capture_intent;
use crate::services::sink::BookingLogSink;
use crate::services::store::{BookingLedger, BookingStore};

/// Pre-filled booking form shown while composing.
#[derive(Debug, Clone, Serialize)]
pub struct BookingForm {
    pub patient_name: String,
    pub phone_no: Option<String>,
    pub services: Vec<String>,
    pub default_service: String,
    pub time_slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowView {
    #[serde(flatten)]
    pub state: FlowState,
    pub last_attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<BookingForm>,
}

/// Work left to do after the ledger lock is released.
enum Next {
    Done(FlowView),
    Checkout {
        attempt: u32,
        therapist: Therapist,
        intent: BookingIntent,
    },
}

#[derive(Clone)]
pub struct BookingService {
    store: BookingStore,
    catalog: TherapistCatalog,
    payments: Arc<dyn PaymentGateway>,
    finalizer: BookingFinalizer,
}

impl BookingService {
    pub fn new(
        store: BookingStore,
        catalog: TherapistCatalog,
        payments: Arc<dyn PaymentGateway>,
        sink: Arc<dyn BookingLogSink>,
    ) -> Self {
        Self {
            store,
            catalog,
            payments,
            finalizer: BookingFinalizer::new(sink),
        }
    }

    pub fn store(&self) -> &BookingStore {
        &self.store
    }

    fn view(&self, flow: &BookingFlow, user: &AppUser, ledger: &BookingLedger) -> FlowView {
        let form = match &flow.state {
            FlowState::Composing { target } => {
                let rescheduled = target
                    .reschedule_of
                    .as_deref()
                    .and_then(|id| ledger.find(id));

                Some(BookingForm {
                    patient_name: rescheduled
                        .map(|b| b.patient_name.clone())
                        .unwrap_or_else(|| user.name.clone()),
                    phone_no: rescheduled.map(|b| b.phone_no.clone()),
                    services: target.therapist.bookable_services(),
                    default_service: rescheduled
                        .map(|b| b.service.clone())
                        .unwrap_or_else(|| target.therapist.default_service()),
                    time_slots: TimeSlot::ALL.to_vec(),
                })
            }
            _ => None,
        };

        FlowView {
            state: flow.state.clone(),
            last_attempt: flow.last_attempt,
            form,
        }
    }

    async fn transition(&self, user: &AppUser, action: FlowAction) -> Result<FlowView, BookingError> {
        self.store
            .with_ledger(|ledger| -> Result<FlowView, BookingError> {
                let next = ledger.flow(&user.id).apply(action)?;
                ledger.set_flow(&user.id, next.clone());
                Ok(self.view(&next, user, ledger))
            })
            .await
    }

    // ==========================================================================
    // BOOKING FLOW
    // ==========================================================================

    pub async fn current_flow(&self, user: &AppUser) -> FlowView {
        self.store
            .with_ledger(|ledger| {
                let flow = ledger.flow(&user.id);
                self.view(&flow, user, ledger)
            })
            .await
    }

    pub async fn start(&self, user: &AppUser, therapist_id: i64) -> Result<FlowView, BookingError> {
        let therapist = self.catalog.get(therapist_id).await.map_err(|e| match e {
            TherapistError::NotFound => BookingError::TherapistNotFound,
            other => BookingError::ValidationError(other.to_string()),
        })?;

        debug!("User {} opening booking form for therapist {}", user.id, therapist_id);
        self.transition(user, FlowAction::Open(FlowTarget { therapist, reschedule_of: None }))
            .await
    }

    pub async fn start_reschedule(&self, user: &AppUser, booking_id: &str) -> Result<FlowView, BookingError> {
        self.store
            .with_ledger(|ledger| -> Result<FlowView, BookingError> {
                let booking = ledger.find(booking_id).ok_or(BookingError::NotFound)?;
                ensure_owner_or_admin(user, booking)?;
                if booking.is_cancelled() {
                    return Err(BookingError::AlreadyCancelled);
                }

                let target = FlowTarget {
                    therapist: booking.therapist.clone(),
                    reschedule_of: Some(booking.id.clone()),
                };
                let next = ledger.flow(&user.id).apply(FlowAction::Open(target))?;
                ledger.set_flow(&user.id, next.clone());
                Ok(self.view(&next, user, ledger))
            })
            .await
    }

    /// Captures the form and routes it through the payment gate.
    pub async fn submit(&self, user: &AppUser, request: SubmitBookingRequest) -> Result<FlowView, BookingError> {
        let intent = capture_intent(&request)?;
        let token = request.request_token.filter(|t| !t.trim().is_empty());

        let next = self
            .store
            .with_ledger(|ledger| -> Result<Next, BookingError> {
                let flow = ledger.flow(&user.id);

                if let Some(token) = token.as_deref() {
                    if let Some(existing) = ledger.booking_for_token(token) {
                        info!("Request token {} already produced booking {}", token, existing.id);
                        let replay = flow.with_finalized(existing.clone());
                        return Ok(Next::Done(self.view(&replay, user, ledger)));
                    }
                    if flow.request_token.as_deref() == Some(token) && flow.state.pending().is_some() {
                        return Ok(Next::Done(self.view(&flow, user, ledger)));
                    }
                }

                let mut captured = flow.apply(FlowAction::CaptureIntent(intent))?;
                captured.request_token = token.clone();

                let (target, intent) = match captured.state.pending() {
                    Some((target, intent)) => (target.clone(), intent.clone()),
                    None => return Err(BookingError::NotFound),
                };

                if requires_online_payment(&target.therapist, target.is_rescheduling()) {
                    let pending = captured.apply(FlowAction::BeginPayment)?;
                    let attempt = pending.last_attempt;
                    ledger.set_flow(&user.id, pending);
                    return Ok(Next::Checkout { attempt, therapist: target.therapist, intent });
                }

                let booking = match target.reschedule_of.as_deref() {
                    Some(booking_id) => Some(self.finalizer.reschedule(ledger, booking_id, &intent)?),
                    None => self.finalizer.finalize(
                        ledger,
                        Some(&intent),
                        Some(&target.therapist),
                        Some(user),
                        false,
                    ),
                };

                let done = match booking {
                    Some(booking) => {
                        record_token(ledger, &captured, &booking);
                        captured.apply(FlowAction::Finalize { attempt: None, booking, paid_online: false })?
                    }
                    None => captured,
                };
                ledger.set_flow(&user.id, done.clone());
                Ok(Next::Done(self.view(&done, user, ledger)))
            })
            .await?;

        match next {
            Next::Done(view) => Ok(view),
            Next::Checkout { attempt, therapist, intent } => {
                self.open_checkout(user, attempt, &therapist, &intent).await
            }
        }
    }

    /// Starts a new payment attempt for the intent kept after a failure.
    pub async fn retry_payment(&self, user: &AppUser) -> Result<FlowView, BookingError> {
        let (attempt, therapist, intent) = self
            .store
            .with_ledger(|ledger| -> Result<(u32, Therapist, BookingIntent), BookingError> {
                let next = ledger.flow(&user.id).apply(FlowAction::BeginPayment)?;
                let (target, intent) = next.state.pending().ok_or(BookingError::NotFound)?;
                let pending = (next.last_attempt, target.therapist.clone(), intent.clone());
                ledger.set_flow(&user.id, next);
                Ok(pending)
            })
            .await?;

        info!("User {} retrying payment, attempt {}", user.id, attempt);
        self.open_checkout(user, attempt, &therapist, &intent).await
    }

    async fn open_checkout(
        &self,
        user: &AppUser,
        attempt: u32,
        therapist: &Therapist,
        intent: &BookingIntent,
    ) -> Result<FlowView, BookingError> {
        let receipt = receipt_for(Utc::now().timestamp_millis());

        let action = match self.payments.create_order(therapist.fee, &receipt).await {
            Ok(order) => FlowAction::OrderCreated {
                attempt,
                checkout: CheckoutConfig::for_appointment(
                    self.payments.key_id(),
                    &order,
                    therapist.id,
                    &therapist.name,
                    &intent.date.to_string(),
                    &user.name,
                    user.email.as_deref(),
                ),
            },
            Err(e) => {
                warn!("Payment initiation failed for attempt {}: {}", attempt, e);
                FlowAction::PaymentFailed { attempt, failure: PaymentFailure::from(&e) }
            }
        };

        match self.transition(user, action).await {
            Err(BookingError::StaleAttempt(stale)) => {
                warn!("Order for superseded attempt {} discarded", stale);
                Ok(self.current_flow(user).await)
            }
            other => other,
        }
    }

    /// Applies what the checkout widget reported for `attempt`.
    pub async fn payment_outcome(
        &self,
        user: &AppUser,
        attempt: u32,
        outcome: CheckoutOutcome,
    ) -> Result<FlowView, BookingError> {
        let (payment_id, signature) = match outcome {
            CheckoutOutcome::Dismissed => {
                return self
                    .transition(user, FlowAction::PaymentFailed {
                        attempt,
                        failure: PaymentFailure::from(&PaymentError::Cancelled),
                    })
                    .await;
            }
            CheckoutOutcome::Failed { description } => {
                let err = PaymentError::GatewayFailure(
                    description
                        .filter(|d| !d.is_empty())
                        .unwrap_or_else(|| "Payment Failed".to_string()),
                );
                return self
                    .transition(user, FlowAction::PaymentFailed { attempt, failure: PaymentFailure::from(&err) })
                    .await;
            }
            CheckoutOutcome::Success { payment_id, signature } => (payment_id, signature),
        };

        let order_id = self
            .store
            .with_ledger(|ledger| -> Result<String, BookingError> {
                let next = ledger.flow(&user.id).apply(FlowAction::BeginVerification {
                    attempt,
                    payment_id: payment_id.clone(),
                })?;
                let order_id = match &next.state {
                    FlowState::PaymentVerifying { order_id, .. } => order_id.clone(),
                    _ => return Err(BookingError::StaleAttempt(attempt)),
                };
                ledger.set_flow(&user.id, next);
                Ok(order_id)
            })
            .await?;

        let verification = match self.payments.verify_payment(&order_id, &payment_id, &signature).await {
            Ok(result) if result.success => Ok(()),
            Ok(result) => Err(result.message.unwrap_or_else(|| "Verification failed".to_string())),
            Err(e) => Err(e.to_string()),
        };

        if let Err(reason) = verification {
            let err = PaymentError::VerificationFailed { payment_id, reason };
            error!("{}", err);
            return match self
                .transition(user, FlowAction::VerificationFailed { attempt, failure: PaymentFailure::from(&err) })
                .await
            {
                Err(BookingError::StaleAttempt(_)) => Err(err.into()),
                other => other,
            };
        }

        self.store
            .with_ledger(|ledger| -> Result<FlowView, BookingError> {
                let flow = ledger.flow(&user.id);
                let (target, intent) = match &flow.state {
                    FlowState::PaymentVerifying { attempt: current, target, intent, .. } if *current == attempt => {
                        (target.clone(), intent.clone())
                    }
                    _ => {
                        error!("Payment {} verified for a flow that moved on; no booking created", payment_id);
                        return Err(BookingError::PaymentNotApplied { payment_id: payment_id.clone() });
                    }
                };

                let next = match self.finalizer.finalize(
                    ledger,
                    Some(&intent),
                    Some(&target.therapist),
                    Some(user),
                    true,
                ) {
                    Some(booking) => {
                        record_token(ledger, &flow, &booking);
                        flow.apply(FlowAction::Finalize { attempt: Some(attempt), booking, paid_online: true })?
                    }
                    None => flow,
                };
                ledger.set_flow(&user.id, next.clone());
                Ok(self.view(&next, user, ledger))
            })
            .await
    }

    pub async fn close(&self, user: &AppUser) -> Result<FlowView, BookingError> {
        self.transition(user, FlowAction::Close).await
    }

    // ==========================================================================
    // BOOKINGS
    // ==========================================================================

    pub async fn overview(&self, user: &AppUser, today: NaiveDate) -> BookingsOverview {
        let mine: Vec<Booking> = self
            .store
            .with_ledger(|ledger| {
                ledger
                    .bookings
                    .iter()
                    .filter(|b| b.user_id == user.id)
                    .cloned()
                    .collect()
            })
            .await;

        let (upcoming, mut history): (Vec<Booking>, Vec<Booking>) =
            mine.into_iter().partition(|b| b.is_upcoming(today));
        history.sort_by(|a, b| b.date.cmp(&a.date));

        BookingsOverview {
            upcoming: upcoming.into_iter().map(|b| BookingView::new(b, today)).collect(),
            history: history.into_iter().map(|b| BookingView::new(b, today)).collect(),
        }
    }

    pub async fn get(&self, user: &AppUser, booking_id: &str) -> Result<Booking, BookingError> {
        self.store
            .with_ledger(|ledger| -> Result<Booking, BookingError> {
                let booking = ledger.find(booking_id).ok_or(BookingError::NotFound)?;
                ensure_can_view(user, booking)?;
                Ok(booking.clone())
            })
            .await
    }

    /// Marks the booking cancelled. The record and its payment flag stay.
    pub async fn cancel(&self, user: &AppUser, booking_id: &str) -> Result<Booking, BookingError> {
        self.store
            .with_ledger(|ledger| -> Result<Booking, BookingError> {
                let booking = ledger.find_mut(booking_id).ok_or(BookingError::NotFound)?;
                ensure_owner_or_admin(user, booking)?;

                if booking.is_cancelled() {
                    debug!("Booking {} already cancelled", booking_id);
                } else {
                    booking.status = BookingStatus::Cancelled;
                    info!("Booking {} cancelled by {}", booking_id, user.id);
                }
                Ok(booking.clone())
            })
            .await
    }

    pub async fn submit_intake(
        &self,
        user: &AppUser,
        booking_id: &str,
        form: IntakeForm,
    ) -> Result<Booking, BookingError> {
        self.store
            .with_ledger(|ledger| -> Result<Booking, BookingError> {
                let booking = ledger.find_mut(booking_id).ok_or(BookingError::NotFound)?;
                if booking.user_id != user.id {
                    return Err(BookingError::Unauthorized);
                }
                if booking.is_cancelled() {
                    return Err(BookingError::AlreadyCancelled);
                }
                if booking.intake_form.is_some() {
                    return Err(BookingError::IntakeAlreadySubmitted);
                }
                form.validate()?;

                booking.intake_form = Some(form);
                info!("Intake form submitted for booking {}", booking_id);
                Ok(booking.clone())
            })
            .await
    }

    pub async fn get_intake(&self, user: &AppUser, booking_id: &str) -> Result<IntakeForm, BookingError> {
        let booking = self.get(user, booking_id).await?;
        booking.intake_form.ok_or(BookingError::IntakeNotFound)
    }

    pub async fn therapist_dashboard(
        &self,
        user: &AppUser,
        today: NaiveDate,
    ) -> Result<TherapistDashboard, BookingError> {
        let therapist_id = user.managed_therapist().ok_or(BookingError::Unauthorized)?;

        let bookings: Vec<Booking> = self
            .store
            .with_ledger(|ledger| {
                ledger
                    .bookings
                    .iter()
                    .filter(|b| b.therapist.id == therapist_id)
                    .cloned()
                    .collect()
            })
            .await;

        let total_patients = bookings.iter().map(|b| b.user_id.as_str()).collect::<HashSet<_>>().len();
        let total_bookings = bookings.len();
        let upcoming = bookings
            .into_iter()
            .filter(|b| b.date >= today)
            .map(|b| BookingView::new(b, today))
            .collect();

        Ok(TherapistDashboard {
            therapist_id,
            upcoming,
            total_patients,
            total_bookings,
        })
    }

    pub async fn all_bookings(&self, user: &AppUser, today: NaiveDate) -> Result<Vec<BookingView>, BookingError> {
        if !user.is_admin() {
            return Err(BookingError::Unauthorized);
        }

        Ok(self
            .store
            .bookings()
            .await
            .into_iter()
            .map(|b| BookingView::new(b, today))
            .collect())
    }
}

impl BookingFlow {
    /// The confirmation a replayed submission sees. Not stored.
    fn with_finalized(&self, booking: Booking) -> BookingFlow {
        BookingFlow {
            state: FlowState::Finalized {
                paid_online: booking.is_paid,
                rescheduled: false,
                booking,
            },
            last_attempt: self.last_attempt,
            request_token: self.request_token.clone(),
        }
    }
}

fn record_token(ledger: &mut BookingLedger, flow: &BookingFlow, booking: &Booking) {
    if let Some(token) = &flow.request_token {
        ledger.tokens.insert(token.clone(), booking.id.clone());
    }
}

fn ensure_owner_or_admin(user: &AppUser, booking: &Booking) -> Result<(), BookingError> {
    if booking.user_id == user.id || user.is_admin() {
        Ok(())
    } else {
        warn!("User {} denied access to booking {}", user.id, booking.id);
        Err(BookingError::Unauthorized)
    }
}

fn ensure_can_view(user: &AppUser, booking: &Booking) -> Result<(), BookingError> {
    if user.managed_therapist() == Some(booking.therapist.id) {
        return Ok(());
    }
    ensure_owner_or_admin(user, booking)
}
