//! # Account Addresses
//!
//! `Address` is a settlement-layer account reference: `0x` followed by 40
//! hex digits. Input is accepted in any case and stored lowercase, so two
//! spellings of the same account compare equal.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const HEX_DIGITS: usize = 40;

/// A validated `0x`-prefixed 20-byte account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAddress`] if the prefix is missing, the
    /// length is wrong, or a non-hex character is present.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let hex = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(|| invalid(value, "missing 0x prefix"))?;
        if hex.len() != HEX_DIGITS {
            return Err(invalid(
                value,
                &format!("expected {HEX_DIGITS} hex digits, got {}", hex.len()),
            ));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid(value, "non-hex character"));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Borrow the normalized address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn invalid(value: &str, reason: &str) -> CoreError {
    CoreError::InvalidAddress {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl std::str::FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "0x52AE1C0a4D5bAbD8F6C2cC4e2e1bD8b4b3fE0a11";

    #[test]
    fn parse_normalizes_to_lowercase() {
        let addr = Address::parse(VALID).unwrap();
        assert_eq!(addr.as_str(), VALID.to_ascii_lowercase());
    }

    #[test]
    fn mixed_case_spellings_compare_equal() {
        let a = Address::parse(VALID).unwrap();
        let b = Address::parse(&VALID.to_ascii_lowercase()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_prefix_rejected() {
        let err = Address::parse(&VALID[2..]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAddress { .. }));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse(&format!("{VALID}00")).is_err());
    }

    #[test]
    fn non_hex_rejected() {
        assert!(Address::parse("0xzz2e1c0a4d5babd8f6c2cc4e2e1bd8b4b3fe0a11").is_err());
    }

    #[test]
    fn serde_rejects_invalid_address() {
        let result: Result<Address, _> = serde_json::from_str("\"not-an-address\"");
        assert!(result.is_err());
    }

    #[test]
    fn serde_roundtrip_preserves_normalized_form() {
        let addr = Address::parse(VALID).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        let parsed: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, parsed);
    }
}
