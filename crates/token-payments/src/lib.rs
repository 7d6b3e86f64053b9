//! # token-payments
//!
//! Token purchases paid through Stripe Checkout, credited exactly once.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  steamid32, quantity  ┌─────────────────┐  hosted page  ┌──────────┐
//! │  Client  │──────────────────────▶│ CheckoutService │──────────────▶│  Stripe  │
//! └──────────┘                       └─────────────────┘               └────┬─────┘
//!                                                                           │ webhook
//! ┌──────────────┐  apply_credit (event record + increment)  ┌──────────────▼─┐
//! │ LedgerStore  │◀──────────────────────────────────────────│ WebhookHandler │
//! └──────────────┘                                           └────────────────┘
//! ```
//!
//! Stripe delivers webhooks at least once and sometimes concurrently. The
//! handler never deduplicates in process: the store's `apply_credit`
//! creates the processed-event record and increments the balance in one
//! create-if-absent operation, so exactly one delivery per event id wins.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use token_payments::{MemoryLedgerStore, StripeClient, WebhookHandler};
//!
//! let stripe = Arc::new(StripeClient::new("sk_test_xxx"));
//! let store = Arc::new(MemoryLedgerStore::new());
//! let handler = WebhookHandler::new("whsec_xxx", stripe, store)?;
//!
//! // raw request body + Stripe-Signature header
//! let outcome = handler.receive(&body, signature).await?;
//! ```

mod checkout;
mod error;
mod notification;
mod player;
mod processor;
mod signature;
mod store;
mod stripe_client;
mod tokens;
mod webhook;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(test)]
mod testing;

pub use checkout::{
    CheckoutConfig, CheckoutRequest, CheckoutService, CheckoutSessionParams, METADATA_PLAYER_ID,
    METADATA_TOKENS,
};
pub use error::{PaymentError, Result};
pub use notification::{
    CHECKOUT_SESSION_COMPLETED, PaymentNotification, PaymentStatus, WebhookEvent,
};
pub use player::PlayerId;
pub use processor::{CheckoutSession, LineItem, PaymentProcessor};
pub use signature::{DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, WebhookVerifier};
pub use store::{Credit, CreditOutcome, LedgerStore, MemoryLedgerStore, ProcessedEventRecord};
pub use stripe_client::{DEFAULT_REQUEST_TIMEOUT, StripeClient};
pub use tokens::{coerce_quantity, parse_int_prefix, resolve_token_count};
pub use webhook::{IgnoreReason, WebhookHandler, WebhookOutcome};

#[cfg(feature = "postgres")]
pub use postgres::PgLedgerStore;
