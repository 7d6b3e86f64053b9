//! Environment Configuration

use std::time::Duration;

use anyhow::{Context, ensure};
use chrono::TimeDelta;
use token_payments::{CheckoutConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TOLERANCE_SECS};

/// Server settings, read once at startup
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,

    /// Stripe secret key (`STRIPE_API_KEY` or `STRIPE_SECRET_KEY`)
    pub stripe_api_key: Option<String>,

    pub webhook_secret: Option<String>,

    /// Maximum signature age; zero disables the check
    pub webhook_tolerance: TimeDelta,

    /// Bound on each outbound Stripe call
    pub stripe_timeout: Duration,

    /// None unless price and both redirect URLs are set
    pub checkout: Option<CheckoutConfig>,

    pub database_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let webhook_tolerance = match get("WEBHOOK_TOLERANCE_SECS") {
            Some(raw) => parse_tolerance(&raw)?,
            None => TimeDelta::seconds(DEFAULT_TOLERANCE_SECS),
        };

        let stripe_timeout = match get("STRIPE_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let checkout = match (
            get("STRIPE_PRICE_ID"),
            get("CHECKOUT_SUCCESS_URL"),
            get("CHECKOUT_CANCEL_URL"),
        ) {
            (Some(price_id), Some(success_url), Some(cancel_url)) => Some(CheckoutConfig {
                price_id,
                success_url,
                cancel_url,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            stripe_api_key: get("STRIPE_API_KEY").or_else(|| get("STRIPE_SECRET_KEY")),
            webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
            webhook_tolerance,
            stripe_timeout,
            checkout,
            database_url: get("DATABASE_URL"),
        })
    }
}

fn parse_tolerance(raw: &str) -> anyhow::Result<TimeDelta> {
    let secs: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("WEBHOOK_TOLERANCE_SECS must be an integer, got {raw:?}"))?;
    ensure!(secs >= 0, "WEBHOOK_TOLERANCE_SECS must not be negative, got {secs}");

    TimeDelta::try_seconds(secs)
        .with_context(|| format!("WEBHOOK_TOLERANCE_SECS out of range: {secs}"))
}

fn parse_timeout(raw: &str) -> anyhow::Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("STRIPE_TIMEOUT_SECS must be a positive integer, got {raw:?}"))?;
    ensure!(secs > 0, "STRIPE_TIMEOUT_SECS must be positive");

    Ok(Duration::from_secs(secs))
}
