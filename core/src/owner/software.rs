use alloy::primitives::{B256, Bytes};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::ecdsa::{Signature, SigningKey, signature::Signer};
use sha2::{Digest, Sha256};

use super::{
    AssertionRequest, PasskeyAuthenticator, PasskeyCredential, PasskeyPublicKey, WebAuthnAssertion,
};
use crate::error::EngineError;

/// An in-process authenticator holding a P256 key, producing assertions the
/// same shape a browser would.
pub struct SoftwarePasskey {
    key: SigningKey,
    rp_id: String,
    origin: String,
}

impl SoftwarePasskey {
    pub fn from_seed(
        seed: [u8; 32],
        rp_id: impl Into<String>,
        origin: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let key = SigningKey::from_slice(&seed).map_err(|e| EngineError::ValidationError {
            message: format!("Invalid P256 secret: {e}"),
        })?;
        Ok(Self {
            key,
            rp_id: rp_id.into(),
            origin: origin.into(),
        })
    }

    pub fn credential(&self) -> PasskeyCredential {
        let point = self.key.verifying_key().to_encoded_point(false);
        let coordinate = |c: Option<&p256::FieldBytes>| {
            c.map(|bytes| B256::from_slice(bytes.as_slice()))
                .unwrap_or_default()
        };
        PasskeyCredential {
            id: URL_SAFE_NO_PAD.encode(Sha256::digest(point.as_bytes())),
            public_key: PasskeyPublicKey {
                x: coordinate(point.x()),
                y: coordinate(point.y()),
            },
            rp_id: self.rp_id.clone(),
            origin: self.origin.clone(),
            display_name: None,
            created_at: None,
        }
    }
}

impl PasskeyAuthenticator for SoftwarePasskey {
    fn get_assertion(&self, request: &AssertionRequest) -> Result<WebAuthnAssertion, EngineError> {
        let mut authenticator_data = Sha256::digest(request.rp_id.as_bytes()).to_vec();
        // user present | user verified
        authenticator_data.push(0x05);
        authenticator_data.extend_from_slice(&0u32.to_be_bytes());

        let client_data_json = format!(
            "{{\"type\":\"webauthn.get\",\"challenge\":\"{}\",\"origin\":\"{}\",\"crossOrigin\":false}}",
            request.encoded_challenge(),
            self.origin
        );

        let mut message = authenticator_data.clone();
        message.extend_from_slice(&Sha256::digest(client_data_json.as_bytes()));
        let signature: Signature = self.key.sign(&message);

        Ok(WebAuthnAssertion {
            authenticator_data: Bytes::from(authenticator_data),
            client_data_json,
            signature: Bytes::copy_from_slice(signature.to_der().as_bytes()),
        })
    }
}
