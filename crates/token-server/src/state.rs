//! Application State

use std::sync::Arc;

use token_payments::{CheckoutService, LedgerStore, WebhookHandler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout session creation (None if Stripe or pricing is not configured)
    pub checkout: Option<Arc<CheckoutService>>,

    /// Webhook credit applier (None if the webhook secret is missing)
    pub webhook: Option<Arc<WebhookHandler>>,

    /// Token ledger
    pub store: Arc<dyn LedgerStore>,
}
