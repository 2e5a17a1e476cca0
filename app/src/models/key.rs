use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use ethers::types::{Address, H256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("expected {expected} hex chars, got {got} in {input:?}")]
    Length {
        input: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid hex in {0:?}")]
    Hex(String),
}

/// Fixed-width hex identifier used as the unit of enrichment.
///
/// `canonical` is the storage form (lowercase, no prefix), `wire` the
/// form sent to the node (lowercase, `0x` prefix).
pub trait Key: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {
    const HEX_LEN: usize;

    fn parse(input: &str) -> Result<Self, KeyError>;

    fn canonical(&self) -> String;

    fn wire(&self) -> String {
        format!("0x{}", self.canonical())
    }
}

fn strip_hex(input: &str, expected: usize) -> Result<&str, KeyError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != expected {
        return Err(KeyError::Length {
            input: input.to_string(),
            expected,
            got: digits.len(),
        });
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(KeyError::Hex(input.to_string()));
    }
    Ok(digits)
}

// ---------------- Transaction hash ----------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash(pub H256);

impl Key for TxHash {
    const HEX_LEN: usize = 64;

    fn parse(input: &str) -> Result<Self, KeyError> {
        let digits = strip_hex(input, Self::HEX_LEN)?;
        H256::from_str(digits)
            .map(TxHash)
            .map_err(|_| KeyError::Hex(input.to_string()))
    }

    fn canonical(&self) -> String {
        format!("{:x}", self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ---------------- Account address ----------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountAddress(pub Address);

impl Key for AccountAddress {
    const HEX_LEN: usize = 40;

    fn parse(input: &str) -> Result<Self, KeyError> {
        let digits = strip_hex(input, Self::HEX_LEN)?;
        Address::from_str(digits)
            .map(AccountAddress)
            .map_err(|_| KeyError::Hex(input.to_string()))
    }

    fn canonical(&self) -> String {
        format!("{:x}", self.0)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0xAB00000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn tx_hash_forms_are_lowercase_and_interchangeable() {
        let key = TxHash::parse(HASH).unwrap();
        let canonical = key.canonical();

        assert_eq!(canonical.len(), 64);
        assert!(canonical.starts_with("ab00"));
        assert_eq!(key.wire(), format!("0x{}", canonical));
        assert_eq!(TxHash::parse(&canonical).unwrap(), key);
        assert_eq!(TxHash::parse(&key.wire()).unwrap(), key);
    }

    #[test]
    fn mixed_case_inputs_collapse_to_one_key() {
        let upper = AccountAddress::parse("0xC02AAA39B223FE8D0A0E5C4F27EAD9083C756CC2").unwrap();
        let lower = AccountAddress::parse("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.canonical(), "c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        assert_eq!(upper.to_string(), "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(AccountAddress::parse("  0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2\r").is_ok());
    }

    #[test]
    fn rejects_wrong_width_and_bad_digits() {
        assert!(matches!(
            AccountAddress::parse("0x1234"),
            Err(KeyError::Length { expected: 40, got: 4, .. })
        ));
        assert!(matches!(
            TxHash::parse(&format!("0x{}", "zz".repeat(32))),
            Err(KeyError::Hex(_))
        ));
        assert!(AccountAddress::parse("").is_err());
    }
}
