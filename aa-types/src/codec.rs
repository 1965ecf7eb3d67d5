//! ABI and hex primitives shared by every account encoder.
//!
//! Tuples are encoded through [`DynSolValue`], which implements the standard
//! head/tail layout: a static region of one word per field, followed by the
//! dynamic blobs in declaration order, each head slot of a dynamic field
//! holding the byte offset of its blob from the start of the tuple.

use alloy::{
    dyn_abi::DynSolValue,
    hex,
    primitives::{FixedBytes, U256, keccak256},
};
use serde::{Deserialize, Serialize};

pub const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodecError {
    #[error("invalid hex: {message}")]
    InvalidHex { message: String },

    #[error("invalid address: {message}")]
    InvalidAddress { message: String },

    #[error("truncated ABI data: needed {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Round a byte length up to the next word boundary.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// Parse a hex string with an optional `0x` prefix.
///
/// Odd-length input is accepted and left-padded with a zero nibble, so `"0x1"`
/// decodes to `[0x01]`.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, CodecError> {
    let stripped = strip_hex_prefix(input);
    let decoded = if stripped.len() % 2 == 1 {
        hex::decode(format!("0{stripped}"))
    } else {
        hex::decode(stripped)
    };

    decoded.map_err(|e| CodecError::InvalidHex {
        message: format!("{input}: {e}"),
    })
}

pub(crate) fn strip_hex_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

/// 32-byte big-endian word.
pub fn encode_uint256(value: U256) -> [u8; WORD] {
    value.to_be_bytes::<WORD>()
}

/// ABI `bytes`: length word followed by the data right-padded to a word boundary.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let total = WORD + padded_len(data.len());
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&encode_uint256(U256::from(data.len())));
    out.extend_from_slice(data);
    out.resize(total, 0);
    out
}

/// ABI `string`, encoded through the same path as `bytes`.
pub fn encode_string(value: &str) -> Vec<u8> {
    encode_bytes(value.as_bytes())
}

/// Inverse of [`encode_bytes`]. Trailing padding is not validated.
pub fn decode_bytes(encoded: &[u8]) -> Result<Vec<u8>, CodecError> {
    if encoded.len() < WORD {
        return Err(CodecError::Truncated {
            expected: WORD,
            actual: encoded.len(),
        });
    }

    let declared = U256::from_be_slice(&encoded[..WORD]);
    let available = encoded.len() - WORD;
    if declared > U256::from(available) {
        return Err(CodecError::Truncated {
            expected: WORD.saturating_add(declared.saturating_to::<usize>()),
            actual: encoded.len(),
        });
    }

    let len = declared.to::<usize>();
    Ok(encoded[WORD..WORD + len].to_vec())
}

/// First four bytes of the keccak256 of a canonical function signature.
pub fn function_selector(signature: &str) -> FixedBytes<4> {
    FixedBytes::from_slice(&keccak256(signature.as_bytes())[..4])
}

/// Encode `fields` as the parameters of a single ABI tuple.
pub fn encode_tuple(fields: &[DynSolValue]) -> Vec<u8> {
    DynSolValue::Tuple(fields.to_vec()).abi_encode_params()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip_across_word_boundaries() {
        for len in [0usize, 1, 31, 32, 33, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let encoded = encode_bytes(&data);

            assert_eq!(encoded.len(), WORD + padded_len(len), "len {len}");
            assert_eq!(encoded.len() % WORD, 0);
            assert_eq!(decode_bytes(&encoded).unwrap(), data, "len {len}");
        }
    }

    #[test]
    fn empty_bytes_is_a_single_zero_word() {
        assert_eq!(encode_bytes(&[]), vec![0u8; WORD]);
        assert_eq!(encode_string(""), vec![0u8; WORD]);
    }

    #[test]
    fn decode_rejects_truncated_input() {
        assert!(matches!(
            decode_bytes(&[0u8; 10]),
            Err(CodecError::Truncated { .. })
        ));

        let mut encoded = encode_bytes(&[1, 2, 3]);
        encoded.truncate(WORD + 2);
        assert!(decode_bytes(&encoded).is_err());
    }

    #[test]
    fn selector_matches_known_values() {
        assert_eq!(
            function_selector("transfer(address,uint256)"),
            FixedBytes::from([0xa9, 0x05, 0x9c, 0xbb])
        );
        assert_eq!(
            function_selector("execute(address,uint256,bytes)"),
            FixedBytes::from([0xb6, 0x1d, 0x27, 0xf6])
        );
    }

    #[test]
    fn hex_parsing_tolerates_odd_length_and_prefix() {
        assert_eq!(parse_hex("0x1").unwrap(), vec![0x01]);
        assert_eq!(parse_hex("abc").unwrap(), vec![0x0a, 0xbc]);
        assert_eq!(parse_hex("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex("0XFF").unwrap(), vec![0xff]);
        assert!(matches!(
            parse_hex("0xzz"),
            Err(CodecError::InvalidHex { .. })
        ));
    }

    #[test]
    fn tuple_offsets_follow_static_region() {
        let tuple = encode_tuple(&[
            DynSolValue::Bytes(vec![0x11; 3]),
            DynSolValue::Uint(U256::from(7), 256),
            DynSolValue::String(String::new()),
            DynSolValue::Bool(true),
        ]);

        // 4 head words, then bytes (len + 1 word), then the empty string's length word
        assert_eq!(tuple.len(), 4 * WORD + 2 * WORD + WORD);
        assert_eq!(U256::from_be_slice(&tuple[0..32]), U256::from(4 * WORD));
        assert_eq!(U256::from_be_slice(&tuple[32..64]), U256::from(7));
        assert_eq!(U256::from_be_slice(&tuple[64..96]), U256::from(6 * WORD));
        assert_eq!(U256::from_be_slice(&tuple[96..128]), U256::from(1));
        assert_eq!(&tuple[128..192], encode_bytes(&[0x11; 3]).as_slice());
        assert_eq!(&tuple[192..224], &[0u8; 32]);
    }
}
