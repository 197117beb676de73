//! # Hex Encoding
//!
//! Conversions between `0x`-prefixed hex strings and field elements.

pub use primitive_types::U256;

use crate::errors::EncodingError;

/// Strip an optional `0x` / `0X` prefix.
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Parse a hex field element (commitment, root, nullifier hash).
pub fn parse_field_element(value: &str) -> Result<U256, EncodingError> {
    let digits = strip_hex_prefix(value);
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    if digits.len() > 64 {
        return Err(EncodingError::OutOfRange {
            value: value.to_string(),
            bits: 256,
        });
    }
    U256::from_str_radix(digits, 16).map_err(|_| EncodingError::InvalidHex(value.to_string()))
}

/// Format a field element as a zero-padded 32-byte hex string.
pub fn to_fixed_hex(value: &U256) -> String {
    format!("0x{}", hex::encode(to_word(value)))
}

/// Big-endian 32-byte representation of a field element.
pub fn to_word(value: &U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_hex_is_padded() {
        let value = U256::from(255u64);
        let hex = to_fixed_hex(&value);
        assert_eq!(hex.len(), 66);
        assert!(hex.ends_with("ff"));
        assert_eq!(parse_field_element(&hex).unwrap(), value);
    }

    #[test]
    fn test_field_element_rejects_oversized() {
        let too_long = format!("0x{}", "1".repeat(65));
        assert!(matches!(
            parse_field_element(&too_long),
            Err(EncodingError::OutOfRange { .. })
        ));
    }
}
