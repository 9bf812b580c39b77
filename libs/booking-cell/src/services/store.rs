use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::Booking;
use crate::services::flow::{BookingFlow, FlowState};

/// Everything the booking core owns: the booking list (ascending by date),
/// one flow register per user, and the finalization idempotency ledger.
/// Idle users have no register, and a request token lives only as long as
/// the flow that carries it.
#[derive(Debug, Default)]
pub struct BookingLedger {
    pub bookings: Vec<Booking>,
    pub flows: HashMap<String, BookingFlow>,
    /// request token -> booking id
    pub tokens: HashMap<String, String>,
    /// Highest attempt number handed out to any user.
    attempt_high_water: u32,
}

impl BookingLedger {
    /// An idle user starts above every attempt already issued, so an outcome
    /// from before the register was released can never match.
    pub fn flow(&self, user_id: &str) -> BookingFlow {
        self.flows.get(user_id).cloned().unwrap_or_else(|| BookingFlow {
            last_attempt: self.attempt_high_water,
            ..Default::default()
        })
    }

    pub fn set_flow(&mut self, user_id: &str, flow: BookingFlow) {
        self.attempt_high_water = self.attempt_high_water.max(flow.last_attempt);

        let previous = if flow.state == FlowState::Idle {
            self.flows.remove(user_id)
        } else {
            self.flows.insert(user_id.to_string(), flow.clone())
        };

        if let Some(token) = previous.and_then(|p| p.request_token) {
            if flow.request_token.as_ref() != Some(&token) {
                self.tokens.remove(&token);
            }
        }
    }

    pub fn find(&self, booking_id: &str) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == booking_id)
    }

    pub fn find_mut(&mut self, booking_id: &str) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == booking_id)
    }

    pub fn booking_for_token(&self, token: &str) -> Option<&Booking> {
        self.tokens.get(token).and_then(|id| self.find(id))
    }

    /// Stable sort on date only: same-day bookings keep insertion order.
    pub fn sort(&mut self) {
        self.bookings.sort_by_key(|b| b.date);
    }
}

/// Shared handle to the ledger. Mutations run inside a synchronous closure, so
/// the lock can never be held across an await.
#[derive(Debug, Clone, Default)]
pub struct BookingStore {
    inner: Arc<Mutex<BookingLedger>>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bookings(bookings: Vec<Booking>) -> Self {
        let mut ledger = BookingLedger { bookings, ..Default::default() };
        ledger.sort();
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub async fn with_ledger<T>(&self, f: impl FnOnce(&mut BookingLedger) -> T) -> T {
        let mut ledger = self.inner.lock().await;
        f(&mut ledger)
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.with_ledger(|ledger| ledger.bookings.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::services::test_support::booking_on;

    #[tokio::test]
    async fn test_seeded_store_is_sorted_and_stable() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        let store = BookingStore::with_bookings(vec![
            booking_on("a", d(12)),
            booking_on("b", d(10)),
            booking_on("c", d(12)),
        ]);

        let ids: Vec<String> = store.bookings().await.into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_token_lookup() {
        let store = BookingStore::with_bookings(vec![booking_on("a", NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())]);

        let found = store
            .with_ledger(|ledger| {
                ledger.tokens.insert("tok".to_string(), "a".to_string());
                ledger.booking_for_token("tok").map(|b| b.id.clone())
            })
            .await;

        assert_eq!(found.as_deref(), Some("a"));
    }

    #[test]
    fn test_idle_flow_releases_register_and_token() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut ledger = BookingLedger::default();
        ledger.bookings.push(booking_on("a", d));
        ledger.tokens.insert("tok".to_string(), "a".to_string());

        let finalized = BookingFlow {
            state: FlowState::Finalized { booking: booking_on("a", d), paid_online: false, rescheduled: false },
            last_attempt: 3,
            request_token: Some("tok".to_string()),
        };
        ledger.set_flow("user-asha", finalized.clone());
        assert_eq!(ledger.flows.len(), 1);
        assert!(ledger.booking_for_token("tok").is_some());

        ledger.set_flow("user-asha", BookingFlow { state: FlowState::Idle, last_attempt: 3, request_token: None });
        assert!(ledger.flows.is_empty());
        assert!(ledger.tokens.is_empty());
        assert_eq!(ledger.flow("user-asha").last_attempt, 3);
        assert_eq!(ledger.flow("someone-new").last_attempt, 3);
    }
}
