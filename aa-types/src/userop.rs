use alloy::{
    core::sol_types::{SolStruct, SolValue},
    primitives::{Address, B256, Bytes, ChainId, U256, keccak256},
    rpc::types::{PackedUserOperation, UserOperation},
    sol_types::eip712_domain,
};
use serde::{Deserialize, Serialize};

use crate::entrypoint::{EntryPoint, EntryPointVersion};

/// UserOp version enum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionedUserOp {
    V0_6(UserOperation),
    V0_7(PackedUserOperation),
}

/// Error type for UserOp operations
#[derive(Debug, Clone, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserOpError {
    #[error("{field} does not fit in 128 bits")]
    FieldTooLarge { field: String },

    #[error("user operation shape does not match entrypoint {version:?}")]
    VersionMismatch { version: EntryPointVersion },

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

mod eip712 {
    alloy::sol! {
        struct PackedUserOperation {
            address sender;
            uint256 nonce;
            bytes initCode;
            bytes callData;
            bytes32 accountGasLimits;
            uint256 preVerificationGas;
            bytes32 gasFees;
            bytes paymasterAndData;
        }
    }
}

/// The on-chain words a packed user operation is hashed and executed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedWords {
    pub init_code: Bytes,
    pub account_gas_limits: B256,
    pub gas_fees: B256,
    pub paymaster_and_data: Bytes,
}

pub fn to_u128(value: U256, field: &str) -> Result<u128, UserOpError> {
    value.try_into().map_err(|_| UserOpError::FieldTooLarge {
        field: field.to_string(),
    })
}

/// Pack two 128-bit quantities into one word, `high` in the upper half.
pub fn pack_u128_pair(
    high: U256,
    high_field: &str,
    low: U256,
    low_field: &str,
) -> Result<B256, UserOpError> {
    let mut word = [0u8; 32];
    word[0..16].copy_from_slice(&to_u128(high, high_field)?.to_be_bytes());
    word[16..32].copy_from_slice(&to_u128(low, low_field)?.to_be_bytes());
    Ok(B256::from(word))
}

/// `factory ‖ factoryData`, or empty when no factory is set. A zero factory
/// passes `factoryData` through unprefixed, which is where EntryPoint v0.8
/// reads its EIP-7702 initCode marker.
pub fn packed_init_code(op: &PackedUserOperation) -> Bytes {
    match op.factory {
        Some(factory) if factory != Address::ZERO => [
            factory.as_slice(),
            op.factory_data.as_ref().map_or(&[][..], |b| &b[..]),
        ]
        .concat()
        .into(),
        Some(_) => op.factory_data.clone().unwrap_or_default(),
        None => Bytes::default(),
    }
}

/// `paymaster ‖ verificationGas(16) ‖ postOpGas(16) ‖ paymasterData`, or empty.
pub fn packed_paymaster_and_data(op: &PackedUserOperation) -> Result<Bytes, UserOpError> {
    let Some(paymaster) = op.paymaster.filter(|p| *p != Address::ZERO) else {
        return Ok(Bytes::default());
    };

    let verification = to_u128(
        op.paymaster_verification_gas_limit.unwrap_or_default(),
        "paymaster_verification_gas_limit",
    )?;
    let post_op = to_u128(
        op.paymaster_post_op_gas_limit.unwrap_or_default(),
        "paymaster_post_op_gas_limit",
    )?;

    Ok([
        paymaster.as_slice(),
        &verification.to_be_bytes()[..],
        &post_op.to_be_bytes()[..],
        op.paymaster_data.as_ref().map_or(&[][..], |b| &b[..]),
    ]
    .concat()
    .into())
}

pub fn packed_words(op: &PackedUserOperation) -> Result<PackedWords, UserOpError> {
    Ok(PackedWords {
        init_code: packed_init_code(op),
        account_gas_limits: pack_u128_pair(
            op.verification_gas_limit,
            "verification_gas_limit",
            op.call_gas_limit,
            "call_gas_limit",
        )?,
        gas_fees: pack_u128_pair(
            op.max_priority_fee_per_gas,
            "max_priority_fee_per_gas",
            op.max_fee_per_gas,
            "max_fee_per_gas",
        )?,
        paymaster_and_data: packed_paymaster_and_data(op)?,
    })
}

/// Compute UserOperation v0.6 hash
pub fn compute_user_op_v06_hash(
    op: &UserOperation,
    entrypoint: Address,
    chain_id: ChainId,
) -> Result<B256, UserOpError> {
    // Signature is excluded; dynamic fields enter as their hashes
    let inner_tuple = (
        op.sender,
        op.nonce,
        keccak256(&op.init_code),
        keccak256(&op.call_data),
        op.call_gas_limit,
        op.verification_gas_limit,
        op.pre_verification_gas,
        op.max_fee_per_gas,
        op.max_priority_fee_per_gas,
        keccak256(&op.paymaster_and_data),
    );
    let inner_hash = keccak256(inner_tuple.abi_encode());

    let outer_tuple = (inner_hash, entrypoint, U256::from(chain_id));
    Ok(keccak256(outer_tuple.abi_encode()))
}

/// Compute UserOperation v0.7 hash
pub fn compute_user_op_v07_hash(
    op: &PackedUserOperation,
    entrypoint: Address,
    chain_id: ChainId,
) -> Result<B256, UserOpError> {
    let words = packed_words(op)?;

    let inner_tuple = (
        op.sender,
        op.nonce,
        keccak256(&words.init_code),
        keccak256(&op.call_data),
        words.account_gas_limits,
        op.pre_verification_gas,
        words.gas_fees,
        keccak256(&words.paymaster_and_data),
    );
    let inner_hash = keccak256(inner_tuple.abi_encode());

    let outer_tuple = (inner_hash, entrypoint, U256::from(chain_id));
    Ok(keccak256(outer_tuple.abi_encode()))
}

/// Compute UserOperation v0.8 hash: the EIP-712 digest under the `ERC4337` domain.
pub fn compute_user_op_v08_hash(
    op: &PackedUserOperation,
    entrypoint: Address,
    chain_id: ChainId,
) -> Result<B256, UserOpError> {
    let words = packed_words(op)?;

    let typed = eip712::PackedUserOperation {
        sender: op.sender,
        nonce: op.nonce,
        initCode: words.init_code,
        callData: op.call_data.clone(),
        accountGasLimits: words.account_gas_limits,
        preVerificationGas: op.pre_verification_gas,
        gasFees: words.gas_fees,
        paymasterAndData: words.paymaster_and_data,
    };

    let domain = eip712_domain! {
        name: "ERC4337",
        version: "1",
        chain_id: chain_id,
        verifying_contract: entrypoint,
    };

    Ok(typed.eip712_signing_hash(&domain))
}

impl VersionedUserOp {
    pub fn sender(&self) -> Address {
        match self {
            VersionedUserOp::V0_6(op) => op.sender,
            VersionedUserOp::V0_7(op) => op.sender,
        }
    }

    pub fn nonce(&self) -> U256 {
        match self {
            VersionedUserOp::V0_6(op) => op.nonce,
            VersionedUserOp::V0_7(op) => op.nonce,
        }
    }

    pub fn call_data(&self) -> &Bytes {
        match self {
            VersionedUserOp::V0_6(op) => &op.call_data,
            VersionedUserOp::V0_7(op) => &op.call_data,
        }
    }

    pub fn signature(&self) -> &Bytes {
        match self {
            VersionedUserOp::V0_6(op) => &op.signature,
            VersionedUserOp::V0_7(op) => &op.signature,
        }
    }

    pub fn set_signature(&mut self, signature: Bytes) {
        match self {
            VersionedUserOp::V0_6(op) => op.signature = signature,
            VersionedUserOp::V0_7(op) => op.signature = signature,
        }
    }

    pub fn with_signature(mut self, signature: Bytes) -> Self {
        self.set_signature(signature);
        self
    }

    /// `(verificationGasLimit, callGasLimit, preVerificationGas)`
    pub fn gas_limits(&self) -> (U256, U256, U256) {
        match self {
            VersionedUserOp::V0_6(op) => (
                op.verification_gas_limit,
                op.call_gas_limit,
                op.pre_verification_gas,
            ),
            VersionedUserOp::V0_7(op) => (
                op.verification_gas_limit,
                op.call_gas_limit,
                op.pre_verification_gas,
            ),
        }
    }

    pub fn set_gas_limits(&mut self, verification: U256, call: U256, pre_verification: U256) {
        match self {
            VersionedUserOp::V0_6(op) => {
                op.verification_gas_limit = verification;
                op.call_gas_limit = call;
                op.pre_verification_gas = pre_verification;
            }
            VersionedUserOp::V0_7(op) => {
                op.verification_gas_limit = verification;
                op.call_gas_limit = call;
                op.pre_verification_gas = pre_verification;
            }
        }
    }

    pub fn set_fees(&mut self, max_fee_per_gas: U256, max_priority_fee_per_gas: U256) {
        match self {
            VersionedUserOp::V0_6(op) => {
                op.max_fee_per_gas = max_fee_per_gas;
                op.max_priority_fee_per_gas = max_priority_fee_per_gas;
            }
            VersionedUserOp::V0_7(op) => {
                op.max_fee_per_gas = max_fee_per_gas;
                op.max_priority_fee_per_gas = max_priority_fee_per_gas;
            }
        }
    }

    pub fn matches(&self, version: EntryPointVersion) -> bool {
        matches!(
            (self, version),
            (VersionedUserOp::V0_6(_), EntryPointVersion::V0_6)
                | (
                    VersionedUserOp::V0_7(_),
                    EntryPointVersion::V0_7 | EntryPointVersion::V0_8
                )
        )
    }

    /// The hash the EntryPoint computes for this operation.
    pub fn hash(&self, entrypoint: &EntryPoint, chain_id: ChainId) -> Result<B256, UserOpError> {
        match (self, entrypoint.version) {
            (VersionedUserOp::V0_6(op), EntryPointVersion::V0_6) => {
                compute_user_op_v06_hash(op, entrypoint.address, chain_id)
            }
            (VersionedUserOp::V0_7(op), EntryPointVersion::V0_7) => {
                compute_user_op_v07_hash(op, entrypoint.address, chain_id)
            }
            (VersionedUserOp::V0_7(op), EntryPointVersion::V0_8) => {
                compute_user_op_v08_hash(op, entrypoint.address, chain_id)
            }
            (_, version) => Err(UserOpError::VersionMismatch { version }),
        }
    }
}
