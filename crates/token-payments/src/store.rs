//! Token Ledger Storage
//!
//! Balances plus the processed-event records that guard them. The only
//! write is [`LedgerStore::apply_credit`], which records the event and
//! increments the balance as one create-if-absent operation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};
use crate::player::PlayerId;

/// A credit to apply exactly once
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credit {
    /// Processor event ID the credit is keyed by
    pub event_id: String,
    pub player_id: PlayerId,
    pub tokens: u64,
}

/// Outcome of [`LedgerStore::apply_credit`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Event recorded and balance incremented
    Applied { balance: u64 },

    /// A record for this event already existed; nothing changed
    AlreadyProcessed,
}

/// Idempotence guard for one applied event
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessedEventRecord {
    pub event_id: String,
    pub processed_at: DateTime<Utc>,
}

/// Ledger storage trait
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Whether a record exists for this event
    async fn is_processed(&self, event_id: &str) -> Result<bool>;

    /// Record the event and increment the balance atomically
    ///
    /// If a record for `credit.event_id` already exists, or another caller
    /// creates one concurrently, returns [`CreditOutcome::AlreadyProcessed`]
    /// and leaves the balance untouched.
    async fn apply_credit(&self, credit: &Credit) -> Result<CreditOutcome>;

    /// Current balance; unknown players have zero
    async fn balance(&self, player_id: &PlayerId) -> Result<u64>;

    /// Get the record for an event
    async fn processed_event(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>>;

    /// Store name
    fn name(&self) -> &str;
}

#[derive(Default)]
struct Ledger {
    events: HashMap<String, ProcessedEventRecord>,
    balances: HashMap<PlayerId, u64>,
}

/// In-memory ledger (for development and tests)
///
/// Both maps live behind one lock so the check, the record insert and the
/// increment happen under the same write guard.
#[derive(Default, Clone)]
pub struct MemoryLedgerStore {
    ledger: Arc<RwLock<Ledger>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of processed-event records
    pub async fn event_count(&self) -> usize {
        self.ledger.read().await.events.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn is_processed(&self, event_id: &str) -> Result<bool> {
        Ok(self.ledger.read().await.events.contains_key(event_id))
    }

    async fn apply_credit(&self, credit: &Credit) -> Result<CreditOutcome> {
        let mut ledger = self.ledger.write().await;

        if ledger.events.contains_key(&credit.event_id) {
            return Ok(CreditOutcome::AlreadyProcessed);
        }

        let current = ledger.balances.get(&credit.player_id).copied().unwrap_or(0);
        let balance = current.checked_add(credit.tokens).ok_or_else(|| {
            PaymentError::Storage(format!("balance overflow for {}", credit.player_id))
        })?;

        ledger.events.insert(
            credit.event_id.clone(),
            ProcessedEventRecord {
                event_id: credit.event_id.clone(),
                processed_at: Utc::now(),
            },
        );
        ledger.balances.insert(credit.player_id.clone(), balance);

        Ok(CreditOutcome::Applied { balance })
    }

    async fn balance(&self, player_id: &PlayerId) -> Result<u64> {
        Ok(self
            .ledger
            .read()
            .await
            .balances
            .get(player_id)
            .copied()
            .unwrap_or(0))
    }

    async fn processed_event(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>> {
        Ok(self.ledger.read().await.events.get(event_id).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credit(event_id: &str, player: &str, tokens: u64) -> Credit {
        Credit {
            event_id: event_id.into(),
            player_id: PlayerId::parse(player).unwrap(),
            tokens,
        }
    }

    #[tokio::test]
    async fn test_apply_credit_once() {
        let store = MemoryLedgerStore::new();
        let player = PlayerId::parse("765611980").unwrap();

        let first = store.apply_credit(&credit("evt_1", "765611980", 10)).await.unwrap();
        let second = store.apply_credit(&credit("evt_1", "765611980", 10)).await.unwrap();

        assert_eq!(first, CreditOutcome::Applied { balance: 10 });
        assert_eq!(second, CreditOutcome::AlreadyProcessed);
        assert_eq!(store.balance(&player).await.unwrap(), 10);
        assert_eq!(store.event_count().await, 1);
        assert!(store.is_processed("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_credits_from_different_events_accumulate() {
        let store = MemoryLedgerStore::new();
        let player = PlayerId::parse("42").unwrap();

        store.apply_credit(&credit("evt_1", "42", 3)).await.unwrap();
        let outcome = store.apply_credit(&credit("evt_2", "42", 4)).await.unwrap();

        assert_eq!(outcome, CreditOutcome::Applied { balance: 7 });
        assert_eq!(store.balance(&player).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_unknown_player_has_zero_balance() {
        let store = MemoryLedgerStore::new();
        let player = PlayerId::parse("1").unwrap();
        assert_eq!(store.balance(&player).await.unwrap(), 0);
        assert!(store.processed_event("evt_x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overflow_leaves_no_record() {
        let store = MemoryLedgerStore::new();
        let player = PlayerId::parse("42").unwrap();

        store.apply_credit(&credit("evt_1", "42", u64::MAX)).await.unwrap();
        let err = store.apply_credit(&credit("evt_2", "42", 1)).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(!store.is_processed("evt_2").await.unwrap());
        assert_eq!(store.balance(&player).await.unwrap(), u64::MAX);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_event_credits_once() {
        let store = MemoryLedgerStore::new();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.apply_credit(&credit("evt_race", "42", 5)).await })
            })
            .collect();

        let mut applied = 0;
        for handle in handles {
            if let CreditOutcome::Applied { .. } = handle.await.unwrap().unwrap() {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(store.balance(&PlayerId::parse("42").unwrap()).await.unwrap(), 5);
        assert_eq!(store.event_count().await, 1);
    }
}
