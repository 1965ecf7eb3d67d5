use alloy::{hex, primitives::Address};

use crate::codec::{CodecError, strip_hex_prefix};

/// Parse a 20-byte address from text. Case is ignored; the checksum is not enforced.
pub fn parse_address(input: &str) -> Result<Address, CodecError> {
    let stripped = strip_hex_prefix(input.trim());
    if stripped.len() != 40 {
        return Err(CodecError::InvalidAddress {
            message: format!("expected 40 hex characters, got {}", stripped.len()),
        });
    }

    let bytes = hex::decode(stripped).map_err(|e| CodecError::InvalidAddress {
        message: format!("{input}: {e}"),
    })?;

    Ok(Address::from_slice(&bytes))
}

/// EIP-55 mixed-case rendering.
pub fn to_checksum(address: &Address) -> String {
    address.to_checksum(None)
}

/// Parse and compare two textual addresses bytewise.
pub fn same_address(a: &str, b: &str) -> Result<bool, CodecError> {
    Ok(parse_address(a)? == parse_address(b)?)
}
