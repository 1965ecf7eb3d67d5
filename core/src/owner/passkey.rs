use std::sync::Arc;

use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, B256, Bytes, U256, uint},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use super::{Owner, OwnerKind, OwnerSignature, PasskeyCredential, unsupported};
use crate::error::EngineError;

/// Order of the P256 group.
pub const P256_N: U256 =
    uint!(0xFFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551_U256);

/// Authenticator data is at least `rpIdHash(32) ‖ flags(1) ‖ signCount(4)`.
const MIN_AUTHENTICATOR_DATA_LEN: usize = 37;

/// Inputs to a WebAuthn `get` ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionRequest {
    pub credential_id: String,
    pub rp_id: String,
    pub challenge: B256,
}

impl AssertionRequest {
    /// The challenge as it appears in client data.
    pub fn encoded_challenge(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.challenge)
    }
}

/// What an authenticator hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnAssertion {
    pub authenticator_data: Bytes,
    pub client_data_json: String,
    /// DER or raw 64-byte `r ‖ s`.
    pub signature: Bytes,
}

/// The platform side of passkey signing: browser, OS keychain or hardware token.
pub trait PasskeyAuthenticator: Send + Sync {
    fn get_assertion(&self, request: &AssertionRequest) -> Result<WebAuthnAssertion, EngineError>;
}

/// A parsed assertion, ready to be encoded for a particular on-chain verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnSignature {
    pub r: U256,
    /// Always normalized to `s <= n / 2`.
    pub s: U256,
    pub authenticator_data: Bytes,
    pub client_data_json: String,
    /// Byte offset of `"type":` in `client_data_json`.
    pub type_index: usize,
    /// Byte offset of `"challenge":` in `client_data_json`.
    pub challenge_index: usize,
}

pub fn normalize_s(s: U256) -> U256 {
    if s > P256_N >> 1 { P256_N - s } else { s }
}

fn parse_p256_signature(bytes: &[u8]) -> Result<(U256, U256), EngineError> {
    let parsed = if bytes.len() == 64 {
        p256::ecdsa::Signature::from_slice(bytes)
    } else {
        p256::ecdsa::Signature::from_der(bytes)
    }
    .map_err(|e| EngineError::InvalidSignature {
        message: format!("Malformed P256 signature: {e}"),
    })?;

    let raw = parsed.to_bytes();
    Ok((
        U256::from_be_slice(&raw[..32]),
        U256::from_be_slice(&raw[32..]),
    ))
}

impl WebAuthnSignature {
    /// Validate an assertion against the challenge it was requested for.
    pub fn from_assertion(
        assertion: WebAuthnAssertion,
        challenge: B256,
    ) -> Result<Self, EngineError> {
        if assertion.authenticator_data.len() < MIN_AUTHENTICATOR_DATA_LEN {
            return Err(EngineError::InvalidSignature {
                message: format!(
                    "Authenticator data too short: {} bytes",
                    assertion.authenticator_data.len()
                ),
            });
        }

        let client_data = &assertion.client_data_json;
        let type_index = client_data.find("\"type\":").ok_or_else(|| {
            EngineError::InvalidSignature {
                message: "Client data has no type field".to_string(),
            }
        })?;
        let challenge_index = client_data.find("\"challenge\":").ok_or_else(|| {
            EngineError::InvalidSignature {
                message: "Client data has no challenge field".to_string(),
            }
        })?;

        let expected = format!(
            "\"challenge\":\"{}\"",
            URL_SAFE_NO_PAD.encode(challenge)
        );
        if !client_data[challenge_index..].starts_with(&expected) {
            return Err(EngineError::SigningError {
                message: "Assertion was produced for a different challenge".to_string(),
            });
        }

        let (r, s) = parse_p256_signature(&assertion.signature)?;

        Ok(Self {
            r,
            s: normalize_s(s),
            authenticator_data: assertion.authenticator_data,
            client_data_json: assertion.client_data_json,
            type_index,
            challenge_index,
        })
    }
}

/// A passkey-backed owner. Only WebAuthn signing is available.
#[derive(Clone)]
pub struct PasskeyOwner {
    credential: PasskeyCredential,
    authenticator: Option<Arc<dyn PasskeyAuthenticator>>,
}

impl std::fmt::Debug for PasskeyOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasskeyOwner")
            .field("credential_id", &self.credential.id)
            .field("rp_id", &self.credential.rp_id)
            .field("has_authenticator", &self.authenticator.is_some())
            .finish()
    }
}

impl PasskeyOwner {
    pub fn new(credential: PasskeyCredential) -> Result<Self, EngineError> {
        credential.validate()?;
        Ok(Self {
            credential,
            authenticator: None,
        })
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn PasskeyAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn credential(&self) -> &PasskeyCredential {
        &self.credential
    }

    pub fn x(&self) -> U256 {
        U256::from_be_bytes(self.credential.public_key.x.0)
    }

    pub fn y(&self) -> U256 {
        U256::from_be_bytes(self.credential.public_key.y.0)
    }

    pub fn sign_webauthn(&self, challenge: B256) -> Result<WebAuthnSignature, EngineError> {
        let authenticator =
            self.authenticator
                .as_ref()
                .ok_or_else(|| EngineError::SigningError {
                    message: "Passkey owner has no authenticator attached".to_string(),
                })?;

        let request = AssertionRequest {
            credential_id: self.credential.id.clone(),
            rp_id: self.credential.rp_id.clone(),
            challenge,
        };
        tracing::debug!(
            credential_id = %request.credential_id,
            %challenge,
            "requesting webauthn assertion"
        );

        let assertion = authenticator.get_assertion(&request)?;
        WebAuthnSignature::from_assertion(assertion, challenge)
    }
}

impl Owner for PasskeyOwner {
    fn kind(&self) -> OwnerKind {
        OwnerKind::Passkey
    }

    fn address(&self) -> Address {
        self.credential.cosmetic_address()
    }

    fn sign_hash(&self, _digest: B256) -> Result<OwnerSignature, EngineError> {
        Err(unsupported("raw hash signing", OwnerKind::Passkey))
    }

    fn sign_message(&self, _message: &[u8]) -> Result<OwnerSignature, EngineError> {
        Err(unsupported("personal message signing", OwnerKind::Passkey))
    }

    fn sign_typed_data(&self, _typed_data: &TypedData) -> Result<OwnerSignature, EngineError> {
        Err(unsupported("typed data signing", OwnerKind::Passkey))
    }
}

#[cfg(test)]
mod tests {
    use p256::ecdsa::{Signature, VerifyingKey, signature::Verifier};
    use sha2::{Digest, Sha256};

    use super::*;
    use crate::owner::SoftwarePasskey;

    fn passkey() -> Arc<SoftwarePasskey> {
        Arc::new(
            SoftwarePasskey::from_seed([7u8; 32], "example.com", "https://example.com").unwrap(),
        )
    }

    #[test]
    fn extracts_client_data_offsets() {
        let challenge = B256::repeat_byte(0xab);
        let encoded = URL_SAFE_NO_PAD.encode(challenge);
        let client_data = format!(
            "{{\"type\":\"webauthn.get\",\"challenge\":\"{encoded}\",\"origin\":\"https://example.com\",\"crossOrigin\":false}}"
        );

        let assertion = WebAuthnAssertion {
            authenticator_data: Bytes::from(vec![0u8; 37]),
            client_data_json: client_data,
            signature: Bytes::from([[0x11u8; 32], [0x22u8; 32]].concat()),
        };
        let parsed = WebAuthnSignature::from_assertion(assertion, challenge).unwrap();

        assert_eq!(parsed.type_index, 1);
        assert_eq!(parsed.challenge_index, 23);
        assert_eq!(parsed.r, U256::from_be_bytes([0x11u8; 32]));
        assert_eq!(parsed.s, U256::from_be_bytes([0x22u8; 32]));
    }

    #[test]
    fn high_s_is_normalized() {
        let high = P256_N - U256::from(5);
        assert_eq!(normalize_s(high), U256::from(5));
        assert_eq!(normalize_s(U256::from(5)), U256::from(5));
        assert_eq!(normalize_s(P256_N >> 1), P256_N >> 1);
    }

    #[test]
    fn rejects_mismatched_challenge() {
        let device = passkey();
        let assertion = device
            .get_assertion(&AssertionRequest {
                credential_id: device.credential().id,
                rp_id: "example.com".to_string(),
                challenge: B256::repeat_byte(1),
            })
            .unwrap();

        assert!(matches!(
            WebAuthnSignature::from_assertion(assertion, B256::repeat_byte(2)),
            Err(EngineError::SigningError { .. })
        ));
    }

    #[test]
    fn assertion_verifies_against_credential_key() {
        let device = passkey();
        let owner = PasskeyOwner::new(device.credential())
            .unwrap()
            .with_authenticator(device.clone());

        let challenge = B256::repeat_byte(0x42);
        let signature = owner.sign_webauthn(challenge).unwrap();
        assert!(signature.s <= P256_N >> 1);

        let mut message = signature.authenticator_data.to_vec();
        message.extend_from_slice(&Sha256::digest(signature.client_data_json.as_bytes()));

        let key = VerifyingKey::from_sec1_bytes(&owner.credential().public_key.to_sec1()).unwrap();
        let sig = Signature::from_scalars(
            signature.r.to_be_bytes::<32>(),
            signature.s.to_be_bytes::<32>(),
        )
        .unwrap();
        assert!(key.verify(&message, &sig).is_ok());
    }

    #[test]
    fn raw_signing_is_unsupported() {
        let owner = PasskeyOwner::new(passkey().credential()).unwrap();
        assert!(matches!(
            owner.sign_hash(B256::ZERO),
            Err(EngineError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            owner.sign_message(b"hello"),
            Err(EngineError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            owner.sign_webauthn(B256::ZERO),
            Err(EngineError::SigningError { .. })
        ));
    }
}
