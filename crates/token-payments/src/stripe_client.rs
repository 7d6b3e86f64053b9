//! Stripe Checkout Integration
//!
//! [`PaymentProcessor`] backed by Stripe's hosted checkout.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
};

use crate::checkout::CheckoutSessionParams;
use crate::error::{PaymentError, Result};
use crate::processor::{CheckoutSession, LineItem, PaymentProcessor};

/// Default bound on a single Stripe API call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    timeout: Duration,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound each API call by `timeout` instead of the default
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, stripe::StripeError>> + Send,
    {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| PaymentError::Stripe(format!("request timed out after {timeout:?}")))?
            .map_err(|e| PaymentError::Stripe(e.to_string()))
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession> {
        let mut create = CreateCheckoutSession::new();
        create.mode = Some(CheckoutSessionMode::Payment);
        create.success_url = Some(&params.success_url);
        create.cancel_url = Some(&params.cancel_url);
        create.client_reference_id = Some(&params.client_reference_id);
        create.allow_promotion_codes = Some(params.allow_promotion_codes);
        create.metadata = Some(
            params
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<HashMap<_, _>>(),
        );
        create.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(params.price_id.clone()),
            quantity: Some(params.quantity),
            ..Default::default()
        }]);

        let session = self
            .bounded(StripeCheckoutSession::create(&self.client, create))
            .await?;

        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
        })
    }

    async fn list_line_items(&self, session_id: &str) -> Result<Vec<LineItem>> {
        let id: CheckoutSessionId = session_id.parse().map_err(|_| {
            PaymentError::Stripe(format!("Invalid checkout session id: {session_id}"))
        })?;

        let session = self
            .bounded(StripeCheckoutSession::retrieve(&self.client, &id, &["line_items"]))
            .await?;

        Ok(session
            .line_items
            .map(|list| list.data)
            .unwrap_or_default()
            .into_iter()
            .map(|item| LineItem {
                quantity: item.quantity,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
