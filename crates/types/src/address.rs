//! Case-insensitive 20-byte on-chain addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A 20-byte on-chain address, normalized to lowercase hex on construction.
///
/// Equality, ordering and hashing all operate on the normalized form so that
/// `Address::from_str("0xABCD...")` and `Address::from_str("0xabcd...")` are
/// the same key everywhere the daemon compares addresses — the store, the
/// router's requester checks, and the provider/vPROV roster all go through
/// this type rather than raw string comparison.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Returns the normalized `0x`-prefixed lowercase hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::MalformedAddress {
                input: trimmed.to_string(),
            });
        }
        Ok(Address(format!("0x{}", hex_part.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case() {
        let a: Address = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01".parse().unwrap();
        let b: Address = "0xabcdef0123456789abcdef0123456789abcdef01".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("0xabcd".parse::<Address>().is_err());
    }

    #[test]
    fn accepts_without_0x_prefix() {
        let a: Address = "abcdef0123456789abcdef0123456789abcdef01".parse().unwrap();
        assert_eq!(a.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }
}
