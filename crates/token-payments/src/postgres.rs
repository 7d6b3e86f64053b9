//! PostgreSQL Ledger
//!
//! `apply_credit` runs in one transaction: the event insert uses
//! `ON CONFLICT DO NOTHING`, so a concurrent duplicate blocks on the primary
//! key and then sees zero affected rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::{PaymentError, Result};
use crate::player::PlayerId;
use crate::store::{Credit, CreditOutcome, LedgerStore, ProcessedEventRecord};

/// PostgreSQL-backed ledger
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PaymentError::Storage(e.to_string()))
    }
}

fn to_db_amount(tokens: u64) -> Result<i64> {
    i64::try_from(tokens)
        .map_err(|_| PaymentError::Storage(format!("token amount {tokens} out of range")))
}

fn from_db_amount(amount: i64) -> Result<u64> {
    u64::try_from(amount).map_err(|_| PaymentError::Storage(format!("negative balance {amount}")))
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn is_processed(&self, event_id: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM processed_events WHERE event_id = $1)")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn apply_credit(&self, credit: &Credit) -> Result<CreditOutcome> {
        let tokens = to_db_amount(credit.tokens)?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO processed_events (event_id, processed_at) VALUES ($1, $2) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(&credit.event_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CreditOutcome::AlreadyProcessed);
        }

        let balance: i64 = sqlx::query_scalar(
            "INSERT INTO token_balances (payer_id, token_count) VALUES ($1, $2) \
             ON CONFLICT (payer_id) DO UPDATE \
             SET token_count = token_balances.token_count + EXCLUDED.token_count, \
                 updated_at = now() \
             RETURNING token_count",
        )
        .bind(credit.player_id.as_str())
        .bind(tokens)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CreditOutcome::Applied {
            balance: from_db_amount(balance)?,
        })
    }

    async fn balance(&self, player_id: &PlayerId) -> Result<u64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT token_count FROM token_balances WHERE payer_id = $1")
                .bind(player_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        balance.map_or(Ok(0), from_db_amount)
    }

    async fn processed_event(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>> {
        let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT event_id, processed_at FROM processed_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(event_id, processed_at)| ProcessedEventRecord {
            event_id,
            processed_at,
        }))
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
