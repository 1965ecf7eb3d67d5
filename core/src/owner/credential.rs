use alloy::primitives::{Address, B256, keccak256};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// P256 public key coordinates, each serialized as `0x` + 64 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasskeyPublicKey {
    pub x: B256,
    pub y: B256,
}

impl PasskeyPublicKey {
    /// SEC1 uncompressed encoding.
    pub fn to_sec1(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(self.x.as_slice());
        out[33..].copy_from_slice(self.y.as_slice());
        out
    }
}

/// The persisted form of a registered passkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasskeyCredential {
    /// base64url (unpadded) credential id
    pub id: String,
    pub public_key: PasskeyPublicKey,
    pub rp_id: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
}

impl PasskeyCredential {
    pub fn id_bytes(&self) -> Result<Vec<u8>, EngineError> {
        URL_SAFE_NO_PAD
            .decode(&self.id)
            .map_err(|e| EngineError::ValidationError {
                message: format!("Credential id is not base64url: {e}"),
            })
    }

    /// Checks the id encoding and that the key is a point on P256.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.id_bytes()?;
        p256::PublicKey::from_sec1_bytes(&self.public_key.to_sec1()).map_err(|_| {
            EngineError::ValidationError {
                message: "Passkey public key is not a valid P256 point".to_string(),
            }
        })?;
        Ok(())
    }

    /// `keccak256(x ‖ y)[12..]`. Not an on-chain identity; only used where an
    /// address-shaped identifier is expected.
    pub fn cosmetic_address(&self) -> Address {
        let hash = keccak256(
            [
                self.public_key.x.as_slice(),
                self.public_key.y.as_slice(),
            ]
            .concat(),
        );
        Address::from_word(hash)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| EngineError::InternalError {
            message: format!("Failed to serialize passkey credential: {e}"),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let credential: Self =
            serde_json::from_str(json).map_err(|e| EngineError::ValidationError {
                message: format!("Malformed passkey credential: {e}"),
            })?;
        credential.validate()?;
        Ok(credential)
    }
}
