//! Key material that authorizes smart account operations.
//!
//! Two owner families exist: secp256k1 keys that can sign arbitrary digests,
//! and passkeys that can only sign through a WebAuthn ceremony. Accounts hold
//! [`AccountOwner`] values and ask them for capabilities; a passkey asked for
//! a raw signature answers with [`EngineError::UnsupportedOperation`].

mod credential;
mod key;
mod passkey;
#[cfg(any(test, feature = "test-utils"))]
mod software;

pub use credential::*;
pub use key::*;
pub use passkey::*;
#[cfg(any(test, feature = "test-utils"))]
pub use software::SoftwarePasskey;

use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, B256, Signature},
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OwnerKind {
    Key,
    Passkey,
}

impl std::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerKind::Key => f.write_str("key"),
            OwnerKind::Passkey => f.write_str("passkey"),
        }
    }
}

/// Which digest an ECDSA signature was produced over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DigestScheme {
    /// The 32-byte digest itself.
    Raw,
    /// EIP-191 `"\x19Ethereum Signed Message:\n" ‖ len ‖ message`.
    PersonalMessage,
    /// EIP-712 `"\x19\x01" ‖ domainSeparator ‖ structHash`.
    TypedData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerSignature {
    pub signer: Address,
    pub signature: Signature,
    pub scheme: DigestScheme,
}

impl OwnerSignature {
    /// `r ‖ s ‖ v` with `v` in {27, 28}.
    pub fn to_bytes(&self) -> [u8; 65] {
        self.signature.as_bytes()
    }

    /// Safe's marker for signatures over an `eth_sign` digest: `v` in {31, 32}.
    pub fn to_eth_sign_bytes(&self) -> [u8; 65] {
        let mut bytes = self.to_bytes();
        bytes[64] += 4;
        bytes
    }
}

pub trait Owner: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> OwnerKind;

    /// The address on-chain validators compare against.
    fn address(&self) -> Address;

    fn sign_hash(&self, digest: B256) -> Result<OwnerSignature, EngineError>;

    fn sign_message(&self, message: &[u8]) -> Result<OwnerSignature, EngineError>;

    fn sign_typed_data(&self, typed_data: &TypedData) -> Result<OwnerSignature, EngineError>;
}

#[derive(Debug, Clone)]
pub enum AccountOwner {
    Key(KeyOwner),
    Passkey(PasskeyOwner),
}

impl AccountOwner {
    pub fn as_key(&self) -> Option<&KeyOwner> {
        match self {
            AccountOwner::Key(owner) => Some(owner),
            AccountOwner::Passkey(_) => None,
        }
    }

    pub fn as_passkey(&self) -> Option<&PasskeyOwner> {
        match self {
            AccountOwner::Key(_) => None,
            AccountOwner::Passkey(owner) => Some(owner),
        }
    }

    pub fn is_passkey(&self) -> bool {
        matches!(self, AccountOwner::Passkey(_))
    }

    /// Run the WebAuthn ceremony over `challenge`. Key owners cannot.
    pub fn sign_webauthn(&self, challenge: B256) -> Result<WebAuthnSignature, EngineError> {
        match self {
            AccountOwner::Passkey(owner) => owner.sign_webauthn(challenge),
            AccountOwner::Key(_) => Err(unsupported("webauthn signing", OwnerKind::Key)),
        }
    }

    fn inner(&self) -> &dyn Owner {
        match self {
            AccountOwner::Key(owner) => owner,
            AccountOwner::Passkey(owner) => owner,
        }
    }
}

impl Owner for AccountOwner {
    fn kind(&self) -> OwnerKind {
        self.inner().kind()
    }

    fn address(&self) -> Address {
        self.inner().address()
    }

    fn sign_hash(&self, digest: B256) -> Result<OwnerSignature, EngineError> {
        self.inner().sign_hash(digest)
    }

    fn sign_message(&self, message: &[u8]) -> Result<OwnerSignature, EngineError> {
        self.inner().sign_message(message)
    }

    fn sign_typed_data(&self, typed_data: &TypedData) -> Result<OwnerSignature, EngineError> {
        self.inner().sign_typed_data(typed_data)
    }
}

impl From<KeyOwner> for AccountOwner {
    fn from(owner: KeyOwner) -> Self {
        AccountOwner::Key(owner)
    }
}

impl From<PasskeyOwner> for AccountOwner {
    fn from(owner: PasskeyOwner) -> Self {
        AccountOwner::Passkey(owner)
    }
}

pub(crate) fn unsupported(operation: &str, owner: OwnerKind) -> EngineError {
    EngineError::UnsupportedOperation {
        operation: operation.to_string(),
        owner: owner.to_string(),
    }
}
