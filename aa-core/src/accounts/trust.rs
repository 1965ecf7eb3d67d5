use aakit_aa_types::EntryPoint;
use aakit_core::{
    call::Call,
    error::EngineError,
    owner::{AccountOwner, OwnerKind},
};
use alloy::{
    primitives::{Address, B256, Bytes, U256, address},
    sol,
    sol_types::SolCall,
};

use super::{
    DUMMY_SIGNATURE, encode_direct_batch, encode_direct_call, personal_sign, single_ecdsa,
};
use crate::{
    account_factory::AddressSource,
    smart_account::{AccountKind, FactoryData, OwnerProof, SmartAccount},
};

pub const BARZ_FACTORY: Address = address!("0x729c310186a57833f622630a16d13f710b83272a");
pub const BARZ_SECP256K1_FACET: Address = address!("0x81b9E3689390C7e74cF526594A105Dea21a8cdD5");

sol! {
    function createAccount(address verificationFacet, bytes owner, uint256 salt) returns (address);
    function getAddress(address verificationFacet, bytes owner, uint256 salt) view returns (address);
}

/// Trust Wallet `Barz` with the secp256k1 verification facet. The owner is
/// registered by its uncompressed public key.
#[derive(Debug, Clone)]
pub struct TrustAccount {
    owner: AccountOwner,
    owner_public_key: Bytes,
    chain_id: u64,
    factory: Address,
    verification_facet: Address,
    salt: U256,
}

impl TrustAccount {
    pub fn new(owner: impl Into<AccountOwner>, chain_id: u64) -> Result<Self, EngineError> {
        let owner = owner.into();
        let owner_public_key = match &owner {
            AccountOwner::Key(key) => key.public_key(),
            AccountOwner::Passkey(_) => {
                return Err(EngineError::UnsupportedOperation {
                    operation: format!("{} account", AccountKind::Trust),
                    owner: OwnerKind::Passkey.to_string(),
                });
            }
        };

        Ok(Self {
            owner,
            owner_public_key,
            chain_id,
            factory: BARZ_FACTORY,
            verification_facet: BARZ_SECP256K1_FACET,
            salt: U256::ZERO,
        })
    }

    pub fn with_salt(mut self, salt: U256) -> Self {
        self.salt = salt;
        self
    }
}

impl SmartAccount for TrustAccount {
    fn kind(&self) -> AccountKind {
        AccountKind::Trust
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn entrypoint(&self) -> EntryPoint {
        EntryPoint::V0_6
    }

    fn owners(&self) -> &[AccountOwner] {
        std::slice::from_ref(&self.owner)
    }

    fn address_source(&self) -> AddressSource {
        AddressSource::FactoryView {
            factory: self.factory,
            calldata: getAddressCall {
                verificationFacet: self.verification_facet,
                owner: self.owner_public_key.clone(),
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
                verificationFacet: self.verification_facet,
                owner: self.owner_public_key.clone(),
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
    use alloy::primitives::hex;

    use super::*;
    use crate::accounts::test_utils::{ANVIL_KEY_2, key};

    #[test]
    fn registers_the_uncompressed_public_key() {
        let owner = key(ANVIL_KEY_2);
        let account = TrustAccount::new(owner.clone(), 1).unwrap();
        let factory_data = account.factory_data().unwrap().unwrap();

        assert_eq!(&factory_data.data[..4], &hex!("296601cd"));
        let public_key = owner.public_key();
        assert_eq!(public_key.len(), 65);
        assert!(
            factory_data
                .data
                .windows(public_key.len())
                .any(|window| window == public_key.as_ref())
        );
    }

    #[test]
    fn stub_matches_signature_length() {
        let account = TrustAccount::new(key(ANVIL_KEY_2), 1).unwrap();
        assert_eq!(
            account.sign_and_encode(B256::ZERO).unwrap().len(),
            account.stub_signature().len()
        );
    }
}
