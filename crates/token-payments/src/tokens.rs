//! Token Count Derivation
//!
//! How many tokens a paid session is worth. The override recorded at
//! session creation wins; otherwise the session's line items are fetched
//! from the processor once and their quantities summed.

use serde_json::Value;

use crate::error::Result;
use crate::notification::PaymentNotification;
use crate::processor::PaymentProcessor;

/// Lenient base-10 integer parse
///
/// Accepts optional leading whitespace and sign followed by digits, and
/// ignores anything after the digits (`"10abc"` is 10). Returns `None` when
/// no digit follows the sign. Out-of-range values saturate.
pub fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    let mut seen_digit = false;
    for byte in digits.bytes().take_while(u8::is_ascii_digit) {
        seen_digit = true;
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(byte - b'0'));
    }

    if !seen_digit {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Coerce a requested quantity to a positive count
///
/// Numbers are truncated, strings go through [`parse_int_prefix`], and any
/// other JSON value is unusable. Unusable or non-positive quantities clamp
/// to 1.
#[allow(clippy::cast_possible_truncation)]
pub fn coerce_quantity(raw: Option<&Value>) -> u64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => parse_int_prefix(s),
        _ => None,
    };

    parsed
        .and_then(|n| u64::try_from(n).ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

/// Resolve the token count for a paid session
///
/// A positive metadata override is returned as-is without contacting the
/// processor. Otherwise the session's line items are looked up and their
/// quantities summed, floored at 1.
pub async fn resolve_token_count(
    notification: &PaymentNotification,
    processor: &dyn PaymentProcessor,
) -> Result<u64> {
    if let Some(tokens) = notification
        .metadata_tokens()
        .and_then(|n| u64::try_from(n).ok())
        .filter(|n| *n > 0)
    {
        return Ok(tokens);
    }

    tracing::debug!(
        session_id = %notification.session_id,
        "No token override in metadata, looking up line items"
    );

    let items = processor.list_line_items(&notification.session_id).await?;
    let total = items
        .iter()
        .filter_map(|item| item.quantity)
        .fold(0u64, u64::saturating_add);

    Ok(total.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubProcessor, paid_notification};
    use serde_json::json;

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("10"), Some(10));
        assert_eq!(parse_int_prefix("  42"), Some(42));
        assert_eq!(parse_int_prefix("7abc"), Some(7));
        assert_eq!(parse_int_prefix("-3"), Some(-3));
        assert_eq!(parse_int_prefix("+8"), Some(8));
        assert_eq!(parse_int_prefix("2.9"), Some(2));
        assert_eq!(parse_int_prefix(""), None);
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_int_prefix("-"), None);
        assert_eq!(parse_int_prefix("99999999999999999999999"), Some(i64::MAX));
    }

    #[test]
    fn test_coerce_quantity_clamps() {
        assert_eq!(coerce_quantity(Some(&json!(5))), 5);
        assert_eq!(coerce_quantity(Some(&json!("12"))), 12);
        assert_eq!(coerce_quantity(Some(&json!(3.7))), 3);
        assert_eq!(coerce_quantity(Some(&json!(0))), 1);
        assert_eq!(coerce_quantity(Some(&json!(-4))), 1);
        assert_eq!(coerce_quantity(Some(&json!("lots"))), 1);
        assert_eq!(coerce_quantity(Some(&json!(null))), 1);
        assert_eq!(coerce_quantity(Some(&json!([2]))), 1);
        assert_eq!(coerce_quantity(None), 1);
    }

    #[tokio::test]
    async fn test_override_skips_lookup() {
        let processor = StubProcessor::with_line_items(vec![Some(99)]);
        let notification = paid_notification("evt_1", Some("765611980"), Some("3"));

        let tokens = resolve_token_count(&notification, &processor).await.unwrap();

        assert_eq!(tokens, 3);
        assert_eq!(processor.lookups(), 0);
    }

    #[tokio::test]
    async fn test_missing_override_sums_line_items() {
        let processor = StubProcessor::with_line_items(vec![Some(2), Some(3)]);
        let notification = paid_notification("evt_1", Some("765611980"), None);

        let tokens = resolve_token_count(&notification, &processor).await.unwrap();

        assert_eq!(tokens, 5);
        assert_eq!(processor.lookups(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_override_falls_back() {
        let processor = StubProcessor::with_line_items(vec![Some(4)]);
        for raw in ["0", "-2", "garbage"] {
            let notification = paid_notification("evt_1", Some("765611980"), Some(raw));
            let tokens = resolve_token_count(&notification, &processor).await.unwrap();
            assert_eq!(tokens, 4, "override {raw:?} should fall back");
        }
        assert_eq!(processor.lookups(), 3);
    }

    #[tokio::test]
    async fn test_empty_line_items_floor_to_one() {
        let processor = StubProcessor::with_line_items(vec![None, Some(0)]);
        let notification = paid_notification("evt_1", Some("765611980"), None);

        let tokens = resolve_token_count(&notification, &processor).await.unwrap();

        assert_eq!(tokens, 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let processor = StubProcessor::failing_lookup();
        let notification = paid_notification("evt_1", Some("765611980"), None);

        let err = resolve_token_count(&notification, &processor).await.unwrap_err();

        assert!(err.is_retryable());
    }
}
