//! Test doubles shared by the unit tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::checkout::CheckoutSessionParams;
use crate::error::{PaymentError, Result};
use crate::notification::{PaymentNotification, PaymentStatus};
use crate::player::PlayerId;
use crate::processor::{CheckoutSession, LineItem, PaymentProcessor};
use crate::store::{Credit, CreditOutcome, LedgerStore, ProcessedEventRecord};

/// Processor stub returning fixed line items and counting lookups
#[derive(Default)]
pub struct StubProcessor {
    line_items: Vec<Option<u64>>,
    fail_create: bool,
    fail_lookup: bool,
    lookups: AtomicUsize,
    created: Mutex<Vec<CheckoutSessionParams>>,
}

impl StubProcessor {
    pub fn with_line_items(quantities: Vec<Option<u64>>) -> Self {
        Self {
            line_items: quantities,
            ..Self::default()
        }
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn failing_lookup() -> Self {
        Self {
            fail_lookup: true,
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn created_sessions(&self) -> Vec<CheckoutSessionParams> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProcessor for StubProcessor {
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession> {
        if self.fail_create {
            return Err(PaymentError::Stripe("card network unavailable".into()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(params.clone());
        let id = format!("cs_test_{}", created.len());
        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.stripe.com/c/pay/{id}"),
            id,
        })
    }

    async fn list_line_items(&self, _session_id: &str) -> Result<Vec<LineItem>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup {
            return Err(PaymentError::Stripe("connection reset".into()));
        }
        Ok(self
            .line_items
            .iter()
            .map(|quantity| LineItem {
                quantity: *quantity,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Store whose every call fails
pub struct FailingStore;

#[async_trait]
impl LedgerStore for FailingStore {
    async fn is_processed(&self, _event_id: &str) -> Result<bool> {
        Err(PaymentError::Storage("connection refused".into()))
    }

    async fn apply_credit(&self, _credit: &Credit) -> Result<CreditOutcome> {
        Err(PaymentError::Storage("connection refused".into()))
    }

    async fn balance(&self, _player_id: &PlayerId) -> Result<u64> {
        Err(PaymentError::Storage("connection refused".into()))
    }

    async fn processed_event(&self, _event_id: &str) -> Result<Option<ProcessedEventRecord>> {
        Err(PaymentError::Storage("connection refused".into()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A paid checkout notification
pub fn paid_notification(
    event_id: &str,
    player_id: Option<&str>,
    tokens: Option<&str>,
) -> PaymentNotification {
    PaymentNotification {
        event_id: event_id.into(),
        session_id: "cs_test_1".into(),
        payment_status: PaymentStatus::Paid,
        metadata_player_id: player_id.map(Into::into),
        client_reference_id: None,
        metadata_tokens: tokens.map(Into::into),
    }
}

/// Raw `checkout.session.completed` webhook body
pub fn completed_event(
    event_id: &str,
    payment_status: &str,
    player_id: Option<&str>,
    tokens: Option<&str>,
) -> Vec<u8> {
    let mut metadata = serde_json::Map::new();
    if let Some(player_id) = player_id {
        metadata.insert("steamid32".into(), json!(player_id));
    }
    if let Some(tokens) = tokens {
        metadata.insert("tokens".into(), json!(tokens));
    }

    serde_json::to_vec(&json!({
        "id": event_id,
        "object": "event",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_1",
                "object": "checkout.session",
                "payment_status": payment_status,
                "client_reference_id": player_id,
                "metadata": metadata,
            }
        }
    }))
    .unwrap()
}
