//! Where a smart account's address comes from.

use alloy::{
    primitives::{Address, B256, Bytes, keccak256},
    sol_types::SolValue,
};
use aakit_core::{
    chain::Chain,
    error::{AlloyRpcErrorToEngineError, EngineError},
};

pub mod utils;

/// How to derive an account address. Local variants never touch the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSource {
    /// The address is given: an EIP-7702 EOA or a caller-supplied account.
    Known(Address),
    /// Plain CREATE2 from a deployer.
    Create2 {
        deployer: Address,
        salt: B256,
        init_code_hash: B256,
    },
    /// `eth_call` of a factory view that returns the counterfactual address.
    FactoryView { factory: Address, calldata: Bytes },
    /// Fetch the proxy creation code from the factory, append `code_suffix`
    /// and run CREATE2 locally.
    Create2WithFactoryCode {
        factory: Address,
        code_call: Bytes,
        code_suffix: Bytes,
        salt: B256,
    },
}

impl AddressSource {
    /// CREATE2 of an EIP-1167 minimal proxy to `implementation`.
    pub fn minimal_proxy(deployer: Address, implementation: Address, salt: B256) -> Self {
        AddressSource::Create2 {
            deployer,
            salt,
            init_code_hash: keccak256(utils::minimal_proxy_init_code(implementation)),
        }
    }

    /// The address, when it can be computed without a chain read.
    pub fn local(&self) -> Option<Address> {
        match self {
            AddressSource::Known(address) => Some(*address),
            AddressSource::Create2 {
                deployer,
                salt,
                init_code_hash,
            } => Some(deployer.create2(*salt, *init_code_hash)),
            AddressSource::FactoryView { .. } | AddressSource::Create2WithFactoryCode { .. } => {
                None
            }
        }
    }

    pub async fn resolve<C: Chain>(&self, chain: &C) -> Result<Address, EngineError> {
        match self {
            AddressSource::Known(address) => Ok(*address),
            AddressSource::Create2 {
                deployer,
                salt,
                init_code_hash,
            } => Ok(deployer.create2(*salt, *init_code_hash)),
            AddressSource::FactoryView { factory, calldata } => {
                let output = chain
                    .public_client()
                    .call(*factory, calldata.clone())
                    .await
                    .map_err(|e| e.to_engine_error(chain))?;

                Address::abi_decode(&output).map_err(|e| {
                    EngineError::contract_decoding_error(
                        Some(*factory),
                        chain.chain_id(),
                        format!("Factory returned a malformed address: {e}"),
                    )
                })
            }
            AddressSource::Create2WithFactoryCode {
                factory,
                code_call,
                code_suffix,
                salt,
            } => {
                let output = chain
                    .public_client()
                    .call(*factory, code_call.clone())
                    .await
                    .map_err(|e| e.to_engine_error(chain))?;

                let creation_code = Bytes::abi_decode(&output).map_err(|e| {
                    EngineError::contract_decoding_error(
                        Some(*factory),
                        chain.chain_id(),
                        format!("Factory returned malformed creation code: {e}"),
                    )
                })?;

                let mut init_code = creation_code.to_vec();
                init_code.extend_from_slice(code_suffix);
                Ok(factory.create2(*salt, keccak256(&init_code)))
            }
        }
    }
}
