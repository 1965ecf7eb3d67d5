//! One strategy per on-chain account family.

use aakit_core::{
    call::Call,
    error::EngineError,
    owner::{AccountOwner, Owner, OwnerKind},
};
use alloy::{
    hex,
    primitives::{B256, Bytes},
    sol_types::SolCall,
};

use crate::smart_account::{AccountKind, OwnerProof};

pub mod erc7579;
pub mod etherspot;
pub mod kernel;
pub mod light;
pub mod nexus;
pub mod nonce_key;
pub mod safe;
pub mod simple;
pub mod simple7702;
pub mod thirdweb;
pub mod trust;

pub use etherspot::EtherspotAccount;
pub use kernel::{Kernel7702Account, KernelV2Account, KernelV3Account, KernelVersion};
pub use light::{LightAccount, LightVersion};
pub use nexus::NexusAccount;
pub use safe::{SafeAccount, SafeConfig};
pub use simple::SimpleAccount;
pub use simple7702::Simple7702Account;
pub use thirdweb::ThirdwebAccount;
pub use trust::TrustAccount;

/// Well-formed ECDSA signature that recovers to no one in particular.
pub(crate) const DUMMY_SIGNATURE: [u8; 65] = hex!(
    "0xfffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c"
);

/// ABI for the `execute(address,uint256,bytes)` family.
pub(crate) mod direct {
    alloy::sol! {
        function execute(address dest, uint256 value, bytes func);
        function executeBatch(address[] dest, uint256[] value, bytes[] func);
    }
}

pub(crate) fn encode_direct_call(call: &Call) -> Bytes {
    direct::executeCall {
        dest: call.to,
        value: call.value,
        func: call.data.clone(),
    }
    .abi_encode()
    .into()
}

pub(crate) fn encode_direct_batch(calls: &[Call]) -> Bytes {
    direct::executeBatchCall {
        dest: calls.iter().map(|call| call.to).collect(),
        value: calls.iter().map(|call| call.value).collect(),
        func: calls.iter().map(|call| call.data.clone()).collect(),
    }
    .abi_encode()
    .into()
}

/// Reject owners an ECDSA-only account cannot validate.
pub(crate) fn require_key_owner(
    kind: AccountKind,
    owner: AccountOwner,
) -> Result<AccountOwner, EngineError> {
    match owner {
        AccountOwner::Key(_) => Ok(owner),
        AccountOwner::Passkey(_) => Err(EngineError::UnsupportedOperation {
            operation: format!("{kind} account"),
            owner: OwnerKind::Passkey.to_string(),
        }),
    }
}

/// EIP-191 signature over the 32 digest bytes, the convention most ECDSA
/// validators recover with.
pub(crate) fn personal_sign(owner: &AccountOwner, digest: B256) -> Result<OwnerProof, EngineError> {
    owner.sign_message(digest.as_slice()).map(OwnerProof::Ecdsa)
}

pub(crate) fn raw_sign(owner: &AccountOwner, digest: B256) -> Result<OwnerProof, EngineError> {
    owner.sign_hash(digest).map(OwnerProof::Ecdsa)
}

pub(crate) fn single_ecdsa(proofs: Vec<OwnerProof>) -> Result<[u8; 65], EngineError> {
    match proofs.as_slice() {
        [OwnerProof::Ecdsa(signature)] => Ok(signature.to_bytes()),
        _ => Err(EngineError::InvalidSignature {
            message: format!(
                "Expected exactly one ECDSA signature, got {} proofs",
                proofs.len()
            ),
        }),
    }
}

pub(crate) fn prefixed(prefix: &[u8], signature: &[u8]) -> Bytes {
    [prefix, signature].concat().into()
}
