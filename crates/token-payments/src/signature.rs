//! Webhook Signature Verification
//!
//! Stripe signs `"<timestamp>.<raw body>"` with HMAC-SHA256 and sends
//! `Stripe-Signature: t=<timestamp>,v1=<hex>[,v1=<hex>...]`. Verification
//! always runs over the bytes exactly as received.

use chrono::{TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default maximum age of a signed timestamp
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

const SCHEME: &str = "v1";

/// Verifies webhook signatures against a shared secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance: TimeDelta,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Create a verifier; an empty secret is a configuration error
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()));
        }

        Ok(Self {
            secret,
            tolerance: TimeDelta::seconds(DEFAULT_TOLERANCE_SECS),
        })
    }

    /// Override the accepted timestamp age
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: TimeDelta) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Verify a payload against its signature header at the current time
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<()> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verify a payload against its signature header at `now` (unix seconds)
    pub fn verify_at(&self, payload: &[u8], header: Option<&str>, now: i64) -> Result<()> {
        let header = header.filter(|h| !h.trim().is_empty()).ok_or_else(|| {
            PaymentError::WebhookSignature("No stripe-signature header value was provided.".into())
        })?;

        let parsed = ParsedHeader::parse(header)?;

        let matched = parsed.signatures.iter().any(|candidate| {
            hex::decode(candidate).is_ok_and(|bytes| {
                self.mac(parsed.timestamp, payload)
                    .verify_slice(&bytes)
                    .is_ok()
            })
        });

        if !matched {
            return Err(PaymentError::WebhookSignature(
                "No signatures found matching the expected signature for payload.".into(),
            ));
        }

        let age = now - parsed.timestamp;
        if self.tolerance > TimeDelta::zero() && age > self.tolerance.num_seconds() {
            return Err(PaymentError::WebhookSignature(
                "Timestamp outside the tolerance zone".into(),
            ));
        }

        Ok(())
    }

    /// Produce a valid header for `payload` at `timestamp`
    ///
    /// Used to sign test fixtures and local replays.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let signature = hex::encode(self.mac(timestamp, payload).finalize().into_bytes());
        format!("t={timestamp},{SCHEME}={signature}")
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

struct ParsedHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

impl<'a> ParsedHeader<'a> {
    fn parse(header: &'a str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for item in header.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp = value.parse::<i64>().ok(),
                SCHEME => signatures.push(value),
                _ => {}
            }
        }

        match timestamp {
            Some(timestamp) if !signatures.is_empty() => Ok(Self { timestamp, signatures }),
            _ => Err(PaymentError::WebhookSignature(
                "Unable to extract timestamp and signatures from header".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const PAYLOAD: &[u8] = b"{\"type\":\"checkout.session.completed\"}";

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SECRET).unwrap()
    }

    fn reason(result: Result<()>) -> String {
        match result {
            Err(PaymentError::WebhookSignature(reason)) => reason,
            other => panic!("expected signature error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_signature() {
        let now = Utc::now().timestamp();
        let header = verifier().sign(PAYLOAD, now);
        assert!(verifier().verify(PAYLOAD, Some(&header)).is_ok());
    }

    #[test]
    fn test_known_vector() {
        // hex(HMAC-SHA256("secret", "1.{}"))
        let verifier = WebhookVerifier::new("secret").unwrap();
        let header = verifier.sign(b"{}", 1);
        let expected = {
            let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
            mac.update(b"1.{}");
            hex::encode(mac.finalize().into_bytes())
        };
        assert_eq!(header, format!("t=1,v1={expected}"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now().timestamp();
        let header = WebhookVerifier::new("other_secret").unwrap().sign(PAYLOAD, now);
        let reason = reason(verifier().verify(PAYLOAD, Some(&header)));
        assert!(reason.contains("No signatures found"));
    }

    #[test]
    fn test_modified_payload_rejected() {
        let now = Utc::now().timestamp();
        let header = verifier().sign(PAYLOAD, now);
        let tampered = b"{\"type\":\"checkout.session.completed\",\"hacked\":true}";
        assert!(verifier().verify(tampered, Some(&header)).is_err());
    }

    #[test]
    fn test_reserialized_payload_rejected() {
        let now = Utc::now().timestamp();
        let raw = b"{\"id\": \"evt_1\",  \"type\": \"x\"}";
        let header = verifier().sign(raw, now);
        let value: serde_json::Value = serde_json::from_slice(raw).unwrap();
        let reserialized = serde_json::to_vec(&value).unwrap();
        assert!(verifier().verify(&reserialized, Some(&header)).is_err());
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let now = Utc::now().timestamp();
        let good = verifier().sign(PAYLOAD, now);
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t={now},v1=deadbeef,v0=ignored,v1={good_sig}");
        assert!(verifier().verify(PAYLOAD, Some(&header)).is_ok());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let now = Utc::now().timestamp();
        let header = verifier().sign(PAYLOAD, now - 600);
        let reason = reason(verifier().verify_at(PAYLOAD, Some(&header), now));
        assert!(reason.contains("tolerance"));
    }

    #[test]
    fn test_zero_tolerance_disables_age_check() {
        let verifier = verifier().with_tolerance(TimeDelta::zero());
        let header = verifier.sign(PAYLOAD, 1_000);
        assert!(verifier.verify_at(PAYLOAD, Some(&header), 1_000_000).is_ok());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        for header in ["garbage", "t=1234567890", "v1=abcdef", "t=abc,v1=abcdef"] {
            let reason = reason(verifier().verify(PAYLOAD, Some(header)));
            assert!(reason.contains("Unable to extract"), "{header}");
        }
    }

    #[test]
    fn test_missing_header_rejected() {
        assert!(reason(verifier().verify(PAYLOAD, None)).contains("No stripe-signature"));
        assert!(reason(verifier().verify(PAYLOAD, Some(""))).contains("No stripe-signature"));
    }

    #[test]
    fn test_empty_secret_is_config_error() {
        assert!(matches!(WebhookVerifier::new(""), Err(PaymentError::Config(_))));
        assert!(matches!(WebhookVerifier::new("  "), Err(PaymentError::Config(_))));
    }
}
