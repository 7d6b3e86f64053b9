//! Payment Processor Abstraction
//!
//! The two outbound calls the service makes: creating a hosted checkout
//! session and reading a session's line items back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::checkout::CheckoutSessionParams;
use crate::error::Result;

/// Payment processor client (Strategy pattern)
///
/// [`crate::StripeClient`] is the production implementation; tests
/// substitute stubs.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a hosted checkout session
    async fn create_checkout_session(&self, params: &CheckoutSessionParams)
    -> Result<CheckoutSession>;

    /// Fetch the line items of an existing session
    ///
    /// One bounded call. Callers never retry it themselves.
    async fn list_line_items(&self, session_id: &str) -> Result<Vec<LineItem>>;

    /// Processor name
    fn name(&self) -> &str;
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Processor session ID
    pub id: String,

    /// URL to redirect the payer to
    pub checkout_url: String,
}

/// A purchased line item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Quantity, if the processor reported one
    pub quantity: Option<u64>,
}
