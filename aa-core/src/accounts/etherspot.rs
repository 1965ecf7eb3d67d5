//! Etherspot modular wallet (ERC-7579) with the multiple-owner ECDSA validator.

use aakit_aa_types::EntryPoint;
use aakit_core::{
    call::Call,
    error::EngineError,
    owner::{AccountOwner, Owner},
};
use alloy::{
    primitives::{Address, B256, Bytes, address, aliases::U192},
    sol,
    sol_types::{SolCall, SolValue},
};

use super::{
    DUMMY_SIGNATURE, erc7579, nonce_key::etherspot_nonce_key, personal_sign, require_key_owner,
    single_ecdsa,
};
use crate::{
    account_factory::AddressSource,
    smart_account::{AccountKind, FactoryData, OwnerProof, SmartAccount},
};

pub const ETHERSPOT_FACTORY: Address = address!("0x2A40091f044e48DEB5C0FCbc6E8Bc3D4C3BC37cD");
pub const ETHERSPOT_BOOTSTRAP: Address = address!("0x0D5154d7751b6e2fDaa06F0cC9B400549394C8AA");
pub const ETHERSPOT_ECDSA_VALIDATOR: Address =
    address!("0x0740Ed7c11b9da33d9C80Bd76b826e4E90CC1906");

sol! {
    struct BootstrapConfig {
        address module;
        bytes data;
    }

    function initMSA(
        BootstrapConfig[] validators,
        BootstrapConfig[] executors,
        BootstrapConfig hook,
        BootstrapConfig[] fallbacks
    );

    function createAccount(bytes32 salt, bytes initCode) returns (address);
    function getAddress(bytes32 salt, bytes initCode) view returns (address);
}

#[derive(Debug, Clone)]
pub struct EtherspotAccount {
    owner: AccountOwner,
    chain_id: u64,
    salt: B256,
}

impl EtherspotAccount {
    pub fn new(owner: impl Into<AccountOwner>, chain_id: u64) -> Result<Self, EngineError> {
        Ok(Self {
            owner: require_key_owner(AccountKind::Etherspot, owner.into())?,
            chain_id,
            salt: B256::ZERO,
        })
    }

    pub fn with_salt(mut self, salt: B256) -> Self {
        self.salt = salt;
        self
    }

    /// `abi.encode(owner, bootstrap, initMSA(...))`, installing only the ECDSA validator.
    fn init_code(&self) -> Bytes {
        let empty = || BootstrapConfig {
            module: Address::ZERO,
            data: Bytes::new(),
        };
        let init_msa = initMSACall {
            validators: vec![BootstrapConfig {
                module: ETHERSPOT_ECDSA_VALIDATOR,
                data: Bytes::new(),
            }],
            executors: vec![],
            hook: empty(),
            fallbacks: vec![],
        }
        .abi_encode();

        (
            self.owner.address(),
            ETHERSPOT_BOOTSTRAP,
            Bytes::from(init_msa),
        )
            .abi_encode_params()
            .into()
    }
}

impl SmartAccount for EtherspotAccount {
    fn kind(&self) -> AccountKind {
        AccountKind::Etherspot
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn entrypoint(&self) -> EntryPoint {
        EntryPoint::V0_7
    }

    fn owners(&self) -> &[AccountOwner] {
        std::slice::from_ref(&self.owner)
    }

    fn address_source(&self) -> AddressSource {
        AddressSource::FactoryView {
            factory: ETHERSPOT_FACTORY,
            calldata: getAddressCall {
                salt: self.salt,
                initCode: self.init_code(),
            }
            .abi_encode()
            .into(),
        }
    }

    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError> {
        Ok(Some(FactoryData {
            factory: ETHERSPOT_FACTORY,
            data: createAccountCall {
                salt: self.salt,
                initCode: self.init_code(),
            }
            .abi_encode()
            .into(),
        }))
    }

    fn encode_call(&self, call: &Call) -> Result<Bytes, EngineError> {
        Ok(erc7579::encode_single(call))
    }

    fn encode_batch(&self, calls: &[Call]) -> Result<Bytes, EngineError> {
        Ok(erc7579::encode_batch(calls))
    }

    fn nonce_key(&self) -> U192 {
        etherspot_nonce_key(ETHERSPOT_ECDSA_VALIDATOR)
    }

    fn stub_signature(&self) -> Bytes {
        Bytes::from(DUMMY_SIGNATURE)
    }

    fn sign(&self, digest: B256) -> Result<Vec<OwnerProof>, EngineError> {
        Ok(vec![personal_sign(&self.owner, digest)?])
    }

    fn encode_signature(&self, proofs: Vec<OwnerProof>) -> Result<Bytes, EngineError> {
        Ok(Bytes::from(single_ecdsa(proofs)?))
    }
}
