//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use token_payments::{CheckoutRequest, PaymentError, SIGNATURE_HEADER};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub webhook_configured: bool,
    pub store: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    fn json(error: impl Into<String>) -> Json<Self> {
        Json(Self {
            error: error.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ReceivedResponse {
    pub received: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.checkout.is_some(),
        webhook_configured: state.webhook.is_some(),
        store: state.store.name().to_string(),
    })
}

/// Create Stripe checkout session
///
/// An unreadable body is treated as `{}` and fails payer validation.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let payload: Value =
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::Object(Map::new()));

    let request = CheckoutRequest::from_json(&payload).map_err(|e| {
        tracing::debug!(error = %e, "Rejected checkout request");
        (StatusCode::BAD_REQUEST, ErrorResponse::json(e.user_message()))
    })?;

    let checkout = state.checkout.as_ref().ok_or_else(|| {
        tracing::error!("create-checkout-session error: Stripe checkout not configured");
        internal_error()
    })?;

    let session = checkout.create_session(&request).await.map_err(|e| {
        tracing::error!(error = %e, "create-checkout-session error");
        internal_error()
    })?;

    Ok(Json(CheckoutResponse {
        url: session.checkout_url,
    }))
}

/// Stripe webhook handler
///
/// The body is taken as raw bytes; the signature covers them exactly.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(webhook) = state.webhook.as_ref() else {
        tracing::error!("Missing STRIPE_WEBHOOK_SECRET");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Webhook not configured").into_response();
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match webhook.receive(&body, signature).await {
        Ok(outcome) => {
            tracing::debug!(outcome = ?outcome, "Webhook acknowledged");
            (StatusCode::OK, Json(ReceivedResponse { received: true })).into_response()
        }
        Err(e @ (PaymentError::WebhookSignature(_) | PaymentError::WebhookPayload(_))) => {
            (StatusCode::BAD_REQUEST, format!("Webhook Error: {e}")).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, retryable = e.is_retryable(), "webhook handler error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// 405 for the checkout route
pub async fn checkout_method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        ErrorResponse::json("Method not allowed"),
    )
}

/// 405 for the webhook route
pub async fn webhook_method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        "Method Not Allowed",
    )
}

fn internal_error() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::json("Internal error"),
    )
}
