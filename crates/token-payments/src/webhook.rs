//! Stripe Webhook Handling
//!
//! Turns one delivery of a payment notification into at most one token
//! credit. Each delivery runs independently:
//!
//! ```text
//! verify signature ──▶ parse ──▶ paid checkout? ──▶ payer id? ──▶ token count
//!        │                │            │                │             │
//!     rejected         ignored      ignored          ignored          ▼
//!                                                              already processed?
//!                                                                 │        │
//!                                                              ignored   apply credit
//! ```

use std::sync::Arc;

use chrono::TimeDelta;
use serde::Serialize;

use crate::error::Result;
use crate::notification::{PaymentNotification, PaymentStatus, WebhookEvent};
use crate::player::PlayerId;
use crate::processor::PaymentProcessor;
use crate::signature::WebhookVerifier;
use crate::store::{Credit, CreditOutcome, LedgerStore};
use crate::tokens::resolve_token_count;

/// Why an authentic delivery was acknowledged without a credit
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum IgnoreReason {
    /// Not a checkout completion
    UnhandledEventType { event_type: String },

    /// Checkout completed without payment
    NotPaid { payment_status: &'static str },

    /// No valid steamid32 in metadata or client reference
    MissingPlayerId,

    /// Derived token count was zero
    NoTokens,
}

/// Terminal state of one acknowledged delivery
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum WebhookOutcome {
    /// Tokens credited by this delivery
    Credited {
        event_id: String,
        player_id: PlayerId,
        tokens: u64,
        balance: u64,
    },

    /// Event was credited by an earlier or concurrent delivery
    AlreadyProcessed { event_id: String },

    /// Nothing to do
    Ignored {
        event_id: String,
        #[serde(flatten)]
        reason: IgnoreReason,
    },
}

/// Webhook handler
pub struct WebhookHandler {
    verifier: WebhookVerifier,
    processor: Arc<dyn PaymentProcessor>,
    store: Arc<dyn LedgerStore>,
}

impl WebhookHandler {
    /// Create a handler; refuses to exist without a webhook secret
    pub fn new(
        webhook_secret: &str,
        processor: Arc<dyn PaymentProcessor>,
        store: Arc<dyn LedgerStore>,
    ) -> Result<Self> {
        Ok(Self {
            verifier: WebhookVerifier::new(webhook_secret)?,
            processor,
            store,
        })
    }

    /// Override the accepted signature age
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: TimeDelta) -> Self {
        self.verifier = self.verifier.with_tolerance(tolerance);
        self
    }

    pub const fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    /// Verify, decode and apply one delivery
    ///
    /// `payload` must be the request body exactly as received. Signature
    /// and payload errors are terminal; store and processor errors are
    /// retryable and should surface to the sender as a server error.
    pub async fn receive(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        if let Err(e) = self.verifier.verify(payload, signature) {
            tracing::warn!(error = %e, "Stripe signature verification failed");
            return Err(e);
        }

        let event = WebhookEvent::parse(payload)?;
        self.handle(event).await
    }

    /// Process an already verified event
    pub async fn handle(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        tracing::info!(event_id = %event.event_id(), "Processing Stripe webhook");

        match event {
            WebhookEvent::CheckoutCompleted(notification) => {
                self.apply_notification(&notification).await
            }
            WebhookEvent::Other {
                event_id,
                event_type,
            } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(WebhookOutcome::Ignored {
                    event_id,
                    reason: IgnoreReason::UnhandledEventType { event_type },
                })
            }
        }
    }

    /// Credit a completed checkout at most once
    pub async fn apply_notification(
        &self,
        notification: &PaymentNotification,
    ) -> Result<WebhookOutcome> {
        let event_id = notification.event_id.clone();

        if notification.payment_status != PaymentStatus::Paid {
            tracing::debug!(
                event_id = %event_id,
                session_id = %notification.session_id,
                payment_status = notification.payment_status.as_str(),
                "Checkout completed without payment"
            );
            return Ok(WebhookOutcome::Ignored {
                event_id,
                reason: IgnoreReason::NotPaid {
                    payment_status: notification.payment_status.as_str(),
                },
            });
        }

        let Some(player_id) = notification.player_id() else {
            tracing::warn!(
                event_id = %event_id,
                session_id = %notification.session_id,
                "Missing/invalid steamid32 for session"
            );
            return Ok(WebhookOutcome::Ignored {
                event_id,
                reason: IgnoreReason::MissingPlayerId,
            });
        };

        let tokens = resolve_token_count(notification, self.processor.as_ref()).await?;
        if tokens == 0 {
            return Ok(WebhookOutcome::Ignored {
                event_id,
                reason: IgnoreReason::NoTokens,
            });
        }

        if self.store.is_processed(&event_id).await? {
            tracing::info!(event_id = %event_id, "Event already processed");
            return Ok(WebhookOutcome::AlreadyProcessed { event_id });
        }

        let credit = Credit {
            event_id,
            player_id,
            tokens,
        };

        match self.store.apply_credit(&credit).await? {
            CreditOutcome::Applied { balance } => {
                tracing::info!(
                    event_id = %credit.event_id,
                    steamid32 = %credit.player_id,
                    tokens,
                    balance,
                    "Credited tokens"
                );
                Ok(WebhookOutcome::Credited {
                    event_id: credit.event_id,
                    player_id: credit.player_id,
                    tokens,
                    balance,
                })
            }
            CreditOutcome::AlreadyProcessed => {
                tracing::info!(event_id = %credit.event_id, "Event credited concurrently");
                Ok(WebhookOutcome::AlreadyProcessed {
                    event_id: credit.event_id,
                })
            }
        }
    }
}
