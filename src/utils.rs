use alloy_primitives::U256;

use crate::error::{IndexerError, Result};

// Parses a chain-native quantity (0x-prefixed hex, or plain decimal) of up to 256 bits
pub fn parse_quantity(raw: &str) -> Result<U256> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some("") => Ok(U256::ZERO),
        Some(digits) => U256::from_str_radix(digits, 16),
        None if raw.is_empty() => return Err(IndexerError::Quantity(raw.to_string())),
        None => U256::from_str_radix(raw, 10),
    };
    parsed.map_err(|_| IndexerError::Quantity(raw.to_string()))
}

// Converts a quantity to the decimal string form stored in the index
pub fn quantity_to_decimal(raw: &str) -> Result<String> {
    parse_quantity(raw).map(|value| value.to_string())
}

// Converts a quantity that must fit in 64 bits, such as a block number
pub fn quantity_to_u64(raw: &str) -> Result<u64> {
    let value = parse_quantity(raw)?;
    if value > U256::from(u64::MAX) {
        return Err(IndexerError::Quantity(raw.to_string()));
    }
    Ok(value.to::<u64>())
}

// Formats a block number as the hex quantity expected by JSON-RPC
pub fn to_quantity(value: u64) -> String {
    format!("{:#x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_quantities_become_decimal() {
        assert_eq!(quantity_to_decimal("0x3e8").unwrap(), "1000");
        assert_eq!(quantity_to_decimal("0x0").unwrap(), "0");
        assert_eq!(quantity_to_decimal("42").unwrap(), "42");
    }

    #[test]
    fn values_wider_than_64_bits_are_kept() {
        // 2^64
        assert_eq!(
            quantity_to_decimal("0x10000000000000000").unwrap(),
            "18446744073709551616"
        );
        assert!(quantity_to_u64("0x10000000000000000").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(quantity_to_decimal("0xzz").is_err());
        assert!(quantity_to_decimal("").is_err());
        assert!(quantity_to_u64("twelve").is_err());
    }

    #[test]
    fn block_numbers_round_trip_through_rpc_form() {
        assert_eq!(to_quantity(1975), "0x7b7");
        assert_eq!(quantity_to_u64(&to_quantity(1975)).unwrap(), 1975);
    }
}
