//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Payer identifier failed validation
    #[error("Invalid steamid32: {0:?}")]
    InvalidPayerId(String),

    /// Webhook signature verification failed
    #[error("{0}")]
    WebhookSignature(String),

    /// Authenticated webhook body is not a usable event
    #[error("Webhook payload invalid: {0}")]
    WebhookPayload(String),

    /// Authenticated checkout event carries an unreadable session
    #[error("Invalid checkout session data: {0}")]
    InvalidSession(String),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    ///
    /// Only dependency failures are worth a redelivery; everything else is
    /// terminal from the sender's point of view.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Stripe(_) | Self::Storage(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidPayerId(_) => "Invalid steamid32",
            Self::WebhookSignature(_) | Self::WebhookPayload(_) => "Webhook Error",
            Self::Config(_) => "Service configuration error.",
            Self::InvalidSession(_) | Self::Stripe(_) | Self::Storage(_) => "Internal error",
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
