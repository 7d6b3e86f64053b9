//! Token checkout HTTP server
//!
//! Axum server exposing checkout session creation and the Stripe webhook
//! that credits purchased tokens.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_payments::{
    CheckoutService, LedgerStore, MemoryLedgerStore, PaymentProcessor, StripeClient,
    WebhookHandler,
};

use crate::config::Settings;
use crate::handlers::{
    checkout_method_not_allowed, create_checkout_session, health_check, stripe_webhook,
    webhook_method_not_allowed,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let store = build_store(&settings).await?;
    let state = build_state(&settings, store)?;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;

    tracing::info!("token-server running on http://{}", settings.bind_addr);
    tracing::info!("  GET  /health");
    tracing::info!("  POST /api/create-checkout-session");
    tracing::info!("  POST /api/stripe-webhook");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire the routes onto shared state
pub fn build_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/create-checkout-session",
            post(create_checkout_session).fallback(checkout_method_not_allowed),
        )
        .route(
            "/api/stripe-webhook",
            post(stripe_webhook).fallback(webhook_method_not_allowed),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_state(settings: &Settings, store: Arc<dyn LedgerStore>) -> anyhow::Result<AppState> {
    let stripe: Option<Arc<dyn PaymentProcessor>> = settings
        .stripe_api_key
        .as_deref()
        .map(|key| {
            let client = StripeClient::new(key).with_timeout(settings.stripe_timeout);
            Arc::new(client) as Arc<dyn PaymentProcessor>
        });

    let checkout = match (&stripe, &settings.checkout) {
        (Some(stripe), Some(config)) => {
            tracing::info!(price_id = %config.price_id, "Stripe checkout configured");
            Some(Arc::new(CheckoutService::new(stripe.clone(), config.clone())))
        }
        (None, _) => {
            tracing::warn!("Stripe not configured - set STRIPE_API_KEY to enable checkout");
            None
        }
        (Some(_), None) => {
            tracing::warn!(
                "Checkout disabled - set STRIPE_PRICE_ID, CHECKOUT_SUCCESS_URL and CHECKOUT_CANCEL_URL"
            );
            None
        }
    };

    let webhook = match (&stripe, settings.webhook_secret.as_deref()) {
        (Some(stripe), Some(secret)) => {
            let handler = WebhookHandler::new(secret, stripe.clone(), store.clone())?
                .with_tolerance(settings.webhook_tolerance);
            Some(Arc::new(handler))
        }
        (_, None) => {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set - webhook will answer 500");
            None
        }
        (None, Some(_)) => {
            tracing::warn!("STRIPE_API_KEY not set - webhook disabled");
            None
        }
    };

    Ok(AppState {
        checkout,
        webhook,
        store,
    })
}

#[cfg(feature = "postgres")]
async fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn LedgerStore>> {
    if let Some(url) = settings.database_url.as_deref() {
        let store = token_payments::PgLedgerStore::connect(url).await?;
        store.migrate().await?;
        tracing::info!("Using PostgreSQL ledger");
        return Ok(Arc::new(store));
    }

    tracing::warn!("DATABASE_URL not set - balances are kept in memory only");
    Ok(Arc::new(MemoryLedgerStore::new()))
}

#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
async fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn LedgerStore>> {
    if settings.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but this build lacks the `postgres` feature");
    }

    tracing::warn!("Balances are kept in memory only");
    Ok(Arc::new(MemoryLedgerStore::new()))
}
