#![allow(dead_code)]

use aakit_core::{owner::KeyOwner, rpc_clients::mock::MockChain};
use alloy::{
    primitives::{Address, B256, U256, hex},
    sol_types::SolValue,
};
use serde_json::{Value, json};

/// First anvil dev account, `0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266`.
pub const ANVIL_KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const ANVIL_KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub fn setup_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aakit_aa_core=debug,aakit_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn key(hex_key: &str) -> KeyOwner {
    KeyOwner::from_private_key(hex_key).unwrap()
}

/// A single ABI word as an `eth_call` result.
pub fn word(value: impl SolValue) -> String {
    format!("0x{}", hex::encode(value.abi_encode()))
}

pub fn address_word(address: Address) -> String {
    word(address)
}

pub fn uint_word(value: u64) -> String {
    word(U256::from(value))
}

/// Vendor gas price (standard tier 1 gwei / 0.1 gwei) and a gas estimate of
/// 200k verification, 100k call and 50k pre-verification.
pub fn script_bundler_gas(chain: &MockChain) {
    chain.bundler().push_result(
        "pimlico_getUserOperationGasPrice",
        json!({
            "slow": { "maxFeePerGas": "0x1", "maxPriorityFeePerGas": "0x1" },
            "standard": { "maxFeePerGas": "0x3b9aca00", "maxPriorityFeePerGas": "0x5f5e100" },
            "fast": { "maxFeePerGas": "0x77359400", "maxPriorityFeePerGas": "0xbebc200" }
        }),
    );
    chain.bundler().push_result(
        "eth_estimateUserOperationGas",
        json!({
            "callGasLimit": "0x186a0",
            "verificationGasLimit": "0x30d40",
            "preVerificationGas": "0xc350"
        }),
    );
}

pub fn receipt_json(user_op_hash: B256, sender: Address, success: bool) -> Value {
    json!({
        "userOpHash": user_op_hash,
        "entryPoint": "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789",
        "sender": sender,
        "nonce": "0x0",
        "actualGasCost": "0x2386f26fc10000",
        "actualGasUsed": "0x3d090",
        "success": success,
        "logs": [{
            "address": sender,
            "topics": [B256::repeat_byte(0x0c)],
            "data": "0x"
        }],
        "receipt": {
            "transactionHash": B256::repeat_byte(0x7a),
            "blockHash": B256::repeat_byte(0x7b),
            "blockNumber": "0x12d687",
            "gasUsed": "0x3d090"
        }
    })
}
