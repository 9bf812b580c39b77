pub mod booking;
pub mod finalizer;
pub mod flow;
pub mod gate;
pub mod intent;
pub mod sink;
pub mod store;

pub use booking::{BookingForm, BookingService, FlowView};
pub use finalizer::BookingFinalizer;
pub use flow::{BookingFlow, FlowAction, FlowState, FlowTarget, PaymentFailure};
pub use gate::requires_online_payment;
pub use intent::{capture_intent, parse_local_date};
pub use sink::{BookingLogRecord, BookingLogSink, HttpLogSink};
pub use store::{BookingLedger, BookingStore};
