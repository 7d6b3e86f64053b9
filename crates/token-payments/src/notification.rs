//! Payment Notifications
//!
//! Decodes an authenticated webhook body into the handful of fields the
//! credit applier needs. Only call this after the signature has verified.

use std::collections::HashMap;

use serde::Deserialize;

use crate::checkout::{METADATA_PLAYER_ID, METADATA_TOKENS};
use crate::error::{PaymentError, Result};
use crate::player::PlayerId;
use crate::tokens::parse_int_prefix;

/// Event type that carries completed checkouts
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Payment status of a checkout session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    Other,
}

impl PaymentStatus {
    pub fn from_stripe(raw: Option<&str>) -> Self {
        match raw {
            Some("paid") => Self::Paid,
            Some("unpaid") => Self::Unpaid,
            _ => Self::Other,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::Other => "other",
        }
    }
}

/// A completed checkout session notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentNotification {
    /// Processor event ID, globally unique per event
    pub event_id: String,

    pub session_id: String,

    pub payment_status: PaymentStatus,

    /// Payer id from session metadata, unvalidated
    pub metadata_player_id: Option<String>,

    /// Payer id from the session's client reference, unvalidated
    pub client_reference_id: Option<String>,

    /// Token override from session metadata, unparsed
    pub metadata_tokens: Option<String>,
}

impl PaymentNotification {
    /// First payer id candidate that is a valid steamid32
    ///
    /// Metadata is preferred over the client reference. Both are untrusted
    /// and go through the same validation.
    pub fn player_id(&self) -> Option<PlayerId> {
        [&self.metadata_player_id, &self.client_reference_id]
            .into_iter()
            .flatten()
            .find_map(|raw| PlayerId::parse(raw).ok())
    }

    /// Token override, if present and numeric
    pub fn metadata_tokens(&self) -> Option<i64> {
        self.metadata_tokens.as_deref().and_then(parse_int_prefix)
    }
}

/// Authenticated webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Checkout completed - may credit tokens
    CheckoutCompleted(PaymentNotification),

    /// Any other event type
    Other { event_id: String, event_type: String },
}

impl WebhookEvent {
    /// Decode a verified webhook body
    ///
    /// A body without `id` and `type` is a [`PaymentError::WebhookPayload`].
    /// A checkout event whose session object cannot be read is a
    /// [`PaymentError::InvalidSession`]; other event kinds are never inspected
    /// past their type.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::WebhookPayload(e.to_string()))?;

        if raw.event_type != CHECKOUT_SESSION_COMPLETED {
            return Ok(Self::Other {
                event_id: raw.id,
                event_type: raw.event_type,
            });
        }

        let object = raw
            .data
            .object
            .ok_or_else(|| PaymentError::InvalidSession("missing data.object".into()))?;
        let session: RawCheckoutSession = serde_json::from_value(object)
            .map_err(|e| PaymentError::InvalidSession(e.to_string()))?;

        let mut metadata = session.metadata.unwrap_or_default();

        Ok(Self::CheckoutCompleted(PaymentNotification {
            event_id: raw.id,
            session_id: session.id,
            payment_status: PaymentStatus::from_stripe(session.payment_status.as_deref()),
            metadata_player_id: metadata.remove(METADATA_PLAYER_ID).flatten(),
            client_reference_id: session.client_reference_id,
            metadata_tokens: metadata.remove(METADATA_TOKENS).flatten(),
        }))
    }

    pub fn event_id(&self) -> &str {
        match self {
            Self::CheckoutCompleted(notification) => &notification.event_id,
            Self::Other { event_id, .. } => event_id,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: RawEventData,
}

/// Only decoded further for checkout events
#[derive(Default, Deserialize)]
struct RawEventData {
    #[serde(default)]
    object: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawCheckoutSession {
    id: String,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, Option<String>>>,
}
