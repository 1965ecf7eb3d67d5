use alloy::{
    dyn_abi::TypedData,
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, B256, Bytes},
    signers::{SignerSync, local::PrivateKeySigner},
};

use super::{DigestScheme, Owner, OwnerKind, OwnerSignature};
use crate::error::EngineError;

/// A secp256k1 private key.
#[derive(Clone)]
pub struct KeyOwner {
    signer: PrivateKeySigner,
}

impl std::fmt::Debug for KeyOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyOwner")
            .field("address", &self.signer.address())
            .finish()
    }
}

fn signing_error(err: alloy::signers::Error) -> EngineError {
    EngineError::SigningError {
        message: err.to_string(),
    }
}

impl KeyOwner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn from_private_key(hex_key: &str) -> Result<Self, EngineError> {
        let signer: PrivateKeySigner =
            hex_key
                .trim()
                .parse()
                .map_err(|e| EngineError::ValidationError {
                    message: format!("Invalid private key: {e}"),
                })?;
        Ok(Self::new(signer))
    }

    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    /// Uncompressed SEC1 public key, `0x04 ‖ x ‖ y`.
    pub fn public_key(&self) -> Bytes {
        Bytes::copy_from_slice(
            self.signer
                .credential()
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes(),
        )
    }

    /// Sign an EIP-7702 authorization tuple. The digest is
    /// `keccak256(0x05 ‖ rlp([chain_id, address, nonce]))`.
    pub fn sign_authorization(
        &self,
        authorization: Authorization,
    ) -> Result<SignedAuthorization, EngineError> {
        let signature = self
            .signer
            .sign_hash_sync(&authorization.signature_hash())
            .map_err(signing_error)?;
        Ok(authorization.into_signed(signature))
    }

    fn signature(
        &self,
        digest: &B256,
        scheme: DigestScheme,
    ) -> Result<OwnerSignature, EngineError> {
        let signature = self.signer.sign_hash_sync(digest).map_err(signing_error)?;
        Ok(OwnerSignature {
            signer: self.signer.address(),
            signature,
            scheme,
        })
    }
}

impl Owner for KeyOwner {
    fn kind(&self) -> OwnerKind {
        OwnerKind::Key
    }

    fn address(&self) -> Address {
        self.signer.address()
    }

    fn sign_hash(&self, digest: B256) -> Result<OwnerSignature, EngineError> {
        self.signature(&digest, DigestScheme::Raw)
    }

    fn sign_message(&self, message: &[u8]) -> Result<OwnerSignature, EngineError> {
        let digest = alloy::primitives::eip191_hash_message(message);
        self.signature(&digest, DigestScheme::PersonalMessage)
    }

    fn sign_typed_data(&self, typed_data: &TypedData) -> Result<OwnerSignature, EngineError> {
        let digest = typed_data
            .eip712_signing_hash()
            .map_err(|e| EngineError::ValidationError {
                message: format!("Invalid typed data: {e}"),
            })?;
        self.signature(&digest, DigestScheme::TypedData)
    }
}
