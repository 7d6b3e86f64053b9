//! Checkout Session Requests
//!
//! Turns a raw `{ steamid32, quantity }` request into the parameters of a
//! hosted checkout session. The payer id is written to two independent
//! places on the session and the quantity is recorded as a token override,
//! so the webhook can recover both without another processor call.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::player::PlayerId;
use crate::processor::{CheckoutSession, PaymentProcessor};
use crate::tokens::coerce_quantity;

/// Metadata key carrying the payer id
pub const METADATA_PLAYER_ID: &str = "steamid32";

/// Metadata key carrying the token override
pub const METADATA_TOKENS: &str = "tokens";

/// Static session settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Processor price ID of a single token
    pub price_id: String,

    /// URL to redirect after successful payment
    pub success_url: String,

    /// URL to redirect if checkout is cancelled
    pub cancel_url: String,
}

/// Validated request to buy tokens
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Account the tokens go to
    pub payer_id: PlayerId,

    /// Number of tokens, always at least 1
    pub quantity: u64,
}

impl CheckoutRequest {
    /// Validate a payer id and coerce a quantity
    ///
    /// The payer id must be a valid steamid32. A missing, malformed or
    /// non-positive quantity is clamped to 1 rather than rejected.
    pub fn build(raw_payer_id: &str, raw_quantity: Option<&Value>) -> Result<Self> {
        let payer_id = PlayerId::parse(raw_payer_id)?;
        let quantity = coerce_quantity(raw_quantity);

        Ok(Self { payer_id, quantity })
    }

    /// Build from a decoded JSON request body
    ///
    /// `steamid32` may be a string or a number; any other value counts as
    /// empty and fails validation.
    pub fn from_json(body: &Value) -> Result<Self> {
        let raw_payer_id = match body.get(METADATA_PLAYER_ID) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        Self::build(&raw_payer_id, body.get("quantity"))
    }

    /// Parameters for the processor's create-session call
    pub fn session_params(&self, config: &CheckoutConfig) -> CheckoutSessionParams {
        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_PLAYER_ID.to_string(), self.payer_id.to_string());
        metadata.insert(METADATA_TOKENS.to_string(), self.quantity.to_string());

        CheckoutSessionParams {
            price_id: config.price_id.clone(),
            quantity: self.quantity,
            metadata,
            client_reference_id: self.payer_id.to_string(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
            allow_promotion_codes: true,
        }
    }
}

/// Provider-neutral create-session parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionParams {
    pub price_id: String,
    pub quantity: u64,
    pub metadata: BTreeMap<String, String>,
    /// Secondary copy of the payer id
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub allow_promotion_codes: bool,
}

impl CheckoutSessionParams {
    /// Payer id as recorded in metadata
    pub fn metadata_player_id(&self) -> Option<&str> {
        self.metadata.get(METADATA_PLAYER_ID).map(String::as_str)
    }

    /// Token override as recorded in metadata
    pub fn metadata_tokens(&self) -> Option<&str> {
        self.metadata.get(METADATA_TOKENS).map(String::as_str)
    }
}

/// Creates checkout sessions through a payment processor
pub struct CheckoutService {
    processor: Arc<dyn PaymentProcessor>,
    config: CheckoutConfig,
}

impl CheckoutService {
    pub fn new(processor: Arc<dyn PaymentProcessor>, config: CheckoutConfig) -> Self {
        Self { processor, config }
    }

    /// Create a hosted checkout session for a validated request
    pub async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let params = request.session_params(&self.config);
        let session = self.processor.create_checkout_session(&params).await?;

        tracing::info!(
            session_id = %session.id,
            steamid32 = %request.payer_id,
            quantity = request.quantity,
            processor = self.processor.name(),
            "Created checkout session"
        );

        Ok(session)
    }
}
