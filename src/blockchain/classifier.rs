use alloy_primitives::U256;
use log::debug;

use crate::error::DecodeError;

// transfer(address,uint256)
pub const TRANSFER_SELECTOR: &str = "0xa9059cbb";

const SELECTOR_LEN: usize = 10;
const WORD_LEN: usize = 64;
const ADDRESS_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub to: String,
    pub amount: U256,
}

// What a transaction's call data says about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxKind {
    Plain,
    TokenTransfer(TokenTransfer),
    Unrecognized,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Plain => "plain",
            TxKind::TokenTransfer(_) => "token_transfer",
            TxKind::Unrecognized => "unrecognized",
        }
    }
}

// Fixed-width ABI view over hex call data. Length and hex are checked up
// front, so word accessors never slice out of range.
pub struct CallData<'a> {
    hex: &'a str,
}

impl<'a> CallData<'a> {
    pub fn parse(input: &'a str, words: usize) -> Result<Self, DecodeError> {
        let expected = SELECTOR_LEN + words * WORD_LEN;
        if input.len() < expected {
            return Err(DecodeError::TooShort {
                expected,
                actual: input.len(),
            });
        }
        let body = input.get(2..expected).ok_or(DecodeError::InvalidHex)?;
        if !input.starts_with("0x") {
            return Err(DecodeError::InvalidHex);
        }
        hex::decode(body).map_err(|_| DecodeError::InvalidHex)?;
        Ok(CallData { hex: &input[..expected] })
    }

    pub fn word(&self, index: usize) -> &'a str {
        let start = SELECTOR_LEN + index * WORD_LEN;
        &self.hex[start..start + WORD_LEN]
    }

    // A left-padded 20-byte address, rendered 0x-prefixed and lowercase
    pub fn address(&self, index: usize) -> Result<String, DecodeError> {
        let word = self.word(index);
        let (padding, address) = word.split_at(WORD_LEN - ADDRESS_LEN);
        if padding.bytes().any(|b| b != b'0') {
            return Err(DecodeError::NonZeroPadding);
        }
        let digits = address.trim_start_matches('0');
        Ok(format!("0x{:0>width$}", digits.to_ascii_lowercase(), width = ADDRESS_LEN))
    }

    pub fn uint(&self, index: usize) -> Result<U256, DecodeError> {
        U256::from_str_radix(self.word(index), 16).map_err(|_| DecodeError::InvalidHex)
    }
}

// Decodes transfer(address,uint256) call data
pub fn decode_transfer(input: &str) -> Result<TokenTransfer, DecodeError> {
    let call = CallData::parse(input, 2)?;
    Ok(TokenTransfer {
        to: call.address(0)?,
        amount: call.uint(1)?,
    })
}

// Classifies a transaction from its call data and recipient. An empty
// recipient is contract creation, whose payload is never decoded.
pub fn classify(input: &str, to: &str) -> TxKind {
    if input.is_empty() || input == "0x" {
        return TxKind::Plain;
    }
    if to.is_empty() {
        return TxKind::Unrecognized;
    }
    let is_transfer = input
        .get(..SELECTOR_LEN)
        .is_some_and(|selector| selector.eq_ignore_ascii_case(TRANSFER_SELECTOR));
    if !is_transfer {
        return TxKind::Unrecognized;
    }
    match decode_transfer(input) {
        Ok(transfer) => TxKind::TokenTransfer(transfer),
        Err(e) => {
            debug!("Transfer selector with undecodable payload ({} chars): {}", input.len(), e);
            TxKind::Unrecognized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_transfer_reports_expected_length() {
        let input = format!("{}{:0>64}", TRANSFER_SELECTOR, "ab");
        assert_eq!(
            decode_transfer(&input),
            Err(DecodeError::TooShort { expected: 138, actual: 74 })
        );
    }

    #[test]
    fn address_keeps_leading_zero_nibbles() {
        let input = format!("{}{:0>64}{:0>64}", TRANSFER_SELECTOR, "00ab", "1");
        let transfer = decode_transfer(&input).unwrap();
        assert_eq!(transfer.to, format!("0x{:0>40}", "ab"));
        assert_eq!(transfer.amount, U256::from(1u64));
    }

    #[test]
    fn dirty_address_padding_is_rejected() {
        let input = format!("{}{}{:0>64}", TRANSFER_SELECTOR, "f".repeat(64), "1");
        assert_eq!(decode_transfer(&input), Err(DecodeError::NonZeroPadding));
    }

    #[test]
    fn non_hex_words_are_rejected() {
        let input = format!("{}{}", TRANSFER_SELECTOR, "g".repeat(128));
        assert_eq!(decode_transfer(&input), Err(DecodeError::InvalidHex));
    }
}
