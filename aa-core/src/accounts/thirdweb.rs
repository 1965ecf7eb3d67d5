use aakit_aa_types::{EntryPoint, EntryPointVersion};
use aakit_core::{
    call::Call,
    error::EngineError,
    owner::{AccountOwner, Owner},
};
use alloy::{
    primitives::{Address, B256, Bytes, address},
    sol,
    sol_types::SolCall,
};

use super::{
    DUMMY_SIGNATURE, encode_direct_batch, encode_direct_call, personal_sign, require_key_owner,
    single_ecdsa,
};
use crate::{
    account_factory::{AddressSource, utils},
    smart_account::{AccountKind, FactoryData, OwnerProof, SmartAccount},
};

pub const THIRDWEB_FACTORY_V0_7: Address = address!("0x4bE0ddfebcA9A5A4a617dee4DeCe99E7c862dceb");
pub const THIRDWEB_IMPLEMENTATION_V0_7: Address =
    address!("0x94eC38a5d2EDA5A543Ab4c08D998338D4082beb2");
pub const THIRDWEB_FACTORY_V0_6: Address = address!("0x85e23b94e7F5E9cC1fF78BCe78cfb15B81f0DF00");
pub const THIRDWEB_IMPLEMENTATION_V0_6: Address =
    address!("0xf22175c80c6e074C171811C59C6c0087e2a6a346");

sol! {
    function createAccount(address admin, bytes salt) returns (address);
}

/// thirdweb `Account`: minimal-proxy clones of a shared implementation.
#[derive(Debug, Clone)]
pub struct ThirdwebAccount {
    owner: AccountOwner,
    chain_id: u64,
    entrypoint: EntryPoint,
    factory: Address,
    implementation: Address,
    salt_data: Bytes,
}

impl ThirdwebAccount {
    pub fn new(
        owner: impl Into<AccountOwner>,
        chain_id: u64,
        version: EntryPointVersion,
    ) -> Result<Self, EngineError> {
        let (factory, implementation) = match version {
            EntryPointVersion::V0_6 => (THIRDWEB_FACTORY_V0_6, THIRDWEB_IMPLEMENTATION_V0_6),
            EntryPointVersion::V0_7 => (THIRDWEB_FACTORY_V0_7, THIRDWEB_IMPLEMENTATION_V0_7),
            EntryPointVersion::V0_8 => {
                return Err(EngineError::validation(
                    "thirdweb accounts are deployed for EntryPoint v0.6 and v0.7",
                ));
            }
        };
        Ok(Self {
            owner: require_key_owner(AccountKind::Thirdweb, owner.into())?,
            chain_id,
            entrypoint: EntryPoint::canonical(version),
            factory,
            implementation,
            salt_data: Bytes::new(),
        })
    }

    /// Create with custom factory and implementation addresses
    pub fn with_addresses(mut self, factory: Address, implementation: Address) -> Self {
        self.factory = factory;
        self.implementation = implementation;
        self
    }

    pub fn with_salt_data(mut self, salt_data: impl Into<Bytes>) -> Self {
        self.salt_data = salt_data.into();
        self
    }
}

impl SmartAccount for ThirdwebAccount {
    fn kind(&self) -> AccountKind {
        AccountKind::Thirdweb
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn entrypoint(&self) -> EntryPoint {
        self.entrypoint
    }

    fn owners(&self) -> &[AccountOwner] {
        std::slice::from_ref(&self.owner)
    }

    fn address_source(&self) -> AddressSource {
        AddressSource::minimal_proxy(
            self.factory,
            self.implementation,
            utils::generate_salt(&self.owner.address(), &self.salt_data),
        )
    }

    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError> {
        Ok(Some(FactoryData {
            factory: self.factory,
            data: createAccountCall {
                admin: self.owner.address(),
                salt: self.salt_data.clone(),
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
        Bytes::from(DUMMY_SIGNATURE)
    }

    fn sign(&self, digest: B256) -> Result<Vec<OwnerProof>, EngineError> {
        Ok(vec![personal_sign(&self.owner, digest)?])
    }

    fn encode_signature(&self, proofs: Vec<OwnerProof>) -> Result<Bytes, EngineError> {
        Ok(Bytes::from(single_ecdsa(proofs)?))
    }
}

#[cfg(test)]
mod tests {
    use aakit_core::owner::KeyOwner;
    use alloy::primitives::address;

    use super::*;

    /// Accounts are keyed by admin address only, so a stand-in key with the
    /// right address is enough to exercise prediction.
    fn account_for(version: EntryPointVersion, admin: Address) -> AddressSource {
        let account = ThirdwebAccount::new(KeyOwner::random(), 1, version).unwrap();
        AddressSource::minimal_proxy(
            account.factory,
            account.implementation,
            utils::generate_salt(&admin, &Bytes::new()),
        )
    }

    #[test]
    fn test_v07_address_prediction() {
        let signer = address!("0xbe2D2B388635D33b0C9C6d60dE9853716e4b51A3");
        let expected_address = address!("0xDA15403AF9690C74f30eCC9cCa686fCAD2C897f8");

        assert_eq!(
            account_for(EntryPointVersion::V0_7, signer).local(),
            Some(expected_address)
        );
    }

    #[test]
    fn test_v06_address_prediction() {
        let signer = address!("0xbe2D2B388635D33b0C9C6d60dE9853716e4b51A3");
        let expected_address = address!("0xB7E052ec0BC8B741Ce7cA7B7dFBaECb4B234ffBE");

        assert_eq!(
            account_for(EntryPointVersion::V0_6, signer).local(),
            Some(expected_address)
        );
    }

    #[test]
    fn address_is_deterministic_per_salt() {
        let owner = KeyOwner::random();
        let account = ThirdwebAccount::new(owner.clone(), 1, EntryPointVersion::V0_7).unwrap();
        let salted = account.clone().with_salt_data(vec![1u8]);

        assert_eq!(
            account.address_source().local(),
            account.address_source().local()
        );
        assert_ne!(
            account.address_source().local(),
            salted.address_source().local()
        );
    }
}
