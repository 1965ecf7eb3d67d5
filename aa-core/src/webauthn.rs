//! Encoding WebAuthn assertions for on-chain P256 verifiers.

use std::{collections::HashSet, sync::LazyLock};

use aakit_aa_types::codec::encode_tuple;
use aakit_core::{
    error::EngineError,
    owner::{P256_N, WebAuthnSignature},
};
use alloy::{
    dyn_abi::DynSolValue,
    primitives::{B256, Bytes, U256},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

/// Minimum `verificationGasLimit` when P256 is verified in contract code.
pub const WEBAUTHN_VERIFICATION_GAS_FLOOR: u64 = 900_000;

/// Authenticator data length with no extensions or attested credential data.
const STUB_AUTHENTICATOR_DATA_LEN: usize = 37;

const CLIENT_DATA_PREFIX: &str = "{\"type\":\"webauthn.get\",\"challenge\":\"";

/// Chains with the RIP-7212 P256 verification precompile.
static P256_PRECOMPILE_CHAINS: LazyLock<HashSet<u64>> = LazyLock::new(|| {
    [
        137, 80002, // polygon
        8453, 84532, // base
        10, 11155420, // optimism
        42161, 421614, // arbitrum
        324,    // zksync era
        42220,  // celo
        534352, // scroll
    ]
    .into_iter()
    .collect()
});

pub fn has_p256_precompile(chain_id: u64) -> bool {
    P256_PRECOMPILE_CHAINS.contains(&chain_id)
}

/// The members of `clientDataJSON` after the challenge, e.g.
/// `"origin":"https://example.com","crossOrigin":false`.
///
/// Only the canonical member order is accepted, since the verifier rebuilds
/// the JSON from these fields.
pub fn client_data_fields(client_data_json: &str) -> Result<&str, EngineError> {
    let malformed = || {
        EngineError::validation(format!(
            "clientDataJSON does not have the expected layout: {client_data_json}"
        ))
    };

    let rest = client_data_json
        .strip_prefix(CLIENT_DATA_PREFIX)
        .ok_or_else(malformed)?;
    let challenge_end = rest.find('"').ok_or_else(malformed)?;
    let challenge = &rest[..challenge_end];
    if challenge.is_empty()
        || !challenge
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(malformed());
    }

    let fields = rest[challenge_end + 1..]
        .strip_prefix(',')
        .and_then(|fields| fields.strip_suffix('}'))
        .ok_or_else(malformed)?;
    if fields.is_empty() {
        return Err(malformed());
    }
    Ok(fields)
}

/// Kernel WebAuthn validator: `abi.encode(bytes authenticatorData,
/// string clientDataJSON, uint256 typeIndex, uint256 r, uint256 s, bool usePrecompile)`.
pub fn encode_kernel_signature(signature: &WebAuthnSignature, use_precompile: bool) -> Bytes {
    encode_tuple(&[
        DynSolValue::Bytes(signature.authenticator_data.to_vec()),
        DynSolValue::String(signature.client_data_json.clone()),
        DynSolValue::Uint(U256::from(signature.type_index), 256),
        DynSolValue::Uint(signature.r, 256),
        DynSolValue::Uint(signature.s, 256),
        DynSolValue::Bool(use_precompile),
    ])
    .into()
}

/// Safe WebAuthn shared signer: `abi.encode(bytes authenticatorData,
/// string clientDataFields, uint256 r, uint256 s)`.
pub fn encode_safe_signature(signature: &WebAuthnSignature) -> Result<Bytes, EngineError> {
    let fields = client_data_fields(&signature.client_data_json)?;
    Ok(encode_safe_fields(signature, fields))
}

fn encode_safe_fields(signature: &WebAuthnSignature, fields: &str) -> Bytes {
    encode_tuple(&[
        DynSolValue::Bytes(signature.authenticator_data.to_vec()),
        DynSolValue::String(fields.to_string()),
        DynSolValue::Uint(signature.r, 256),
        DynSolValue::Uint(signature.s, 256),
    ])
    .into()
}

/// An assertion shaped like the one a browser produces for `origin`.
/// Encodes to the same length as a real assertion with canonical client data.
pub fn stub_signature(origin: &str) -> WebAuthnSignature {
    let challenge = URL_SAFE_NO_PAD.encode(B256::ZERO);
    let client_data_json = format!(
        "{CLIENT_DATA_PREFIX}{challenge}\",\"origin\":\"{origin}\",\"crossOrigin\":false}}"
    );
    let mut authenticator_data = vec![0x49u8; STUB_AUTHENTICATOR_DATA_LEN];
    authenticator_data[32] = 0x05;
    authenticator_data[33..].fill(0);

    WebAuthnSignature {
        r: P256_N - U256::from(1),
        s: P256_N >> 1,
        authenticator_data: authenticator_data.into(),
        client_data_json,
        type_index: 1,
        challenge_index: 23,
    }
}

/// [`encode_safe_signature`] of [`stub_signature`].
pub fn stub_safe_signature(origin: &str) -> Bytes {
    let fields = format!("\"origin\":\"{origin}\",\"crossOrigin\":false");
    encode_safe_fields(&stub_signature(origin), &fields)
}
