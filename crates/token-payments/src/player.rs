//! Player Identifiers
//!
//! A steamid32 is the numeric account id tokens are credited to. It must
//! match `^[1-9]\d{0,15}$`: non-empty, no leading zero, at most 16 digits.

use serde::{Serialize, Serializer};

use crate::error::{PaymentError, Result};

/// Maximum number of digits in a steamid32
pub const MAX_PLAYER_ID_DIGITS: usize = 16;

/// Validated steamid32
///
/// The only way to obtain one is [`PlayerId::parse`], so holding a
/// `PlayerId` means the value is safe to use as a credit target.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(String);

impl PlayerId {
    /// Validate a raw identifier
    pub fn parse(raw: &str) -> Result<Self> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(PaymentError::InvalidPayerId(raw.to_owned()))
        }
    }

    /// Check a raw identifier against the steamid32 format
    pub fn is_valid(raw: &str) -> bool {
        let bytes = raw.as_bytes();
        match bytes.first() {
            Some(b'1'..=b'9') => {
                bytes.len() <= MAX_PLAYER_ID_DIGITS && bytes.iter().all(u8::is_ascii_digit)
            }
            _ => false,
        }
    }

    /// Get the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PlayerId {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for PlayerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for PlayerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_ids() {
        for raw in ["1", "9", "765611980", "1000000000000000", "9999999999999999"] {
            let id = PlayerId::parse(raw).unwrap();
            assert_eq!(id.as_str(), raw);
        }
    }

    #[test]
    fn test_rejects_invalid_ids() {
        for raw in [
            "",
            "0",
            "0123",
            "12a4",
            " 123",
            "123 ",
            "-5",
            "+5",
            "1.5",
            "10000000000000000", // 17 digits
            "١٢٣",                // non-ASCII digits
        ] {
            assert!(
                matches!(PlayerId::parse(raw), Err(PaymentError::InvalidPayerId(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = PlayerId::parse("765611980").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"765611980\"");
    }
}
