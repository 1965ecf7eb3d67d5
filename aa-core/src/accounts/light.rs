use aakit_aa_types::{EntryPoint, EntryPointVersion};
use aakit_core::{
    call::Call,
    error::EngineError,
    owner::{AccountOwner, Owner},
};
use alloy::{
    primitives::{Address, B256, Bytes, U256, address},
    sol,
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};

use super::{
    DUMMY_SIGNATURE, encode_direct_batch, encode_direct_call, personal_sign, prefixed,
    require_key_owner, single_ecdsa,
};
use crate::{
    account_factory::AddressSource,
    smart_account::{AccountKind, FactoryData, OwnerProof, SmartAccount},
};

pub const LIGHT_FACTORY_V1_1: Address = address!("0x00004EC70002a32400f8ae005A26081065620D20");
pub const LIGHT_FACTORY_V2: Address = address!("0x0000000000400CdFef5E2714E63d8040b700BC24");

/// LightAccount v2 signature type for an EOA owner.
const SIGNATURE_TYPE_EOA: u8 = 0x00;

sol! {
    function createAccount(address owner, uint256 salt) returns (address);
    function getAddress(address owner, uint256 salt) view returns (address);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightVersion {
    /// v1.1.0 on EntryPoint v0.6
    #[serde(rename = "1.1.0")]
    V1_1,
    /// v2.0.0 on EntryPoint v0.7
    #[serde(rename = "2.0.0")]
    V2,
}

/// Alchemy `LightAccount`.
#[derive(Debug, Clone)]
pub struct LightAccount {
    owner: AccountOwner,
    chain_id: u64,
    version: LightVersion,
    factory: Address,
    salt: U256,
}

impl LightAccount {
    pub fn new(
        owner: impl Into<AccountOwner>,
        chain_id: u64,
        version: LightVersion,
    ) -> Result<Self, EngineError> {
        let factory = match version {
            LightVersion::V1_1 => LIGHT_FACTORY_V1_1,
            LightVersion::V2 => LIGHT_FACTORY_V2,
        };
        Ok(Self {
            owner: require_key_owner(AccountKind::Light, owner.into())?,
            chain_id,
            version,
            factory,
            salt: U256::ZERO,
        })
    }

    pub fn with_salt(mut self, salt: U256) -> Self {
        self.salt = salt;
        self
    }
}

impl SmartAccount for LightAccount {
    fn kind(&self) -> AccountKind {
        AccountKind::Light
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn entrypoint(&self) -> EntryPoint {
        match self.version {
            LightVersion::V1_1 => EntryPoint::canonical(EntryPointVersion::V0_6),
            LightVersion::V2 => EntryPoint::canonical(EntryPointVersion::V0_7),
        }
    }

    fn owners(&self) -> &[AccountOwner] {
        std::slice::from_ref(&self.owner)
    }

    fn address_source(&self) -> AddressSource {
        AddressSource::FactoryView {
            factory: self.factory,
            calldata: getAddressCall {
                owner: self.owner.address(),
                salt: self.salt,
            }
            .abi_encode()
            .into(),
        }
    }

    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError> {
        Ok(Some(FactoryData {
            factory: self.factory,
            data: createAccountCall {
                owner: self.owner.address(),
                salt: self.salt,
            }
            .abi_encode()
            .into(),
        }))
    }

    fn encode_call(&self, call: &Call) -> Result<Bytes, EngineError> {
        Ok(encode_direct_call(call))
    }

    fn encode_batch(&self, calls: &[Call]) -> Result<Bytes, EngineError> {
        Ok(encode_direct_batch(calls))
    }

    fn stub_signature(&self) -> Bytes {
        match self.version {
            LightVersion::V1_1 => Bytes::from(DUMMY_SIGNATURE),
            LightVersion::V2 => prefixed(&[SIGNATURE_TYPE_EOA], &DUMMY_SIGNATURE),
        }
    }

    fn sign(&self, digest: B256) -> Result<Vec<OwnerProof>, EngineError> {
        Ok(vec![personal_sign(&self.owner, digest)?])
    }

    fn encode_signature(&self, proofs: Vec<OwnerProof>) -> Result<Bytes, EngineError> {
        let signature = single_ecdsa(proofs)?;
        Ok(match self.version {
            LightVersion::V1_1 => Bytes::from(signature),
            LightVersion::V2 => prefixed(&[SIGNATURE_TYPE_EOA], &signature),
        })
    }
}
