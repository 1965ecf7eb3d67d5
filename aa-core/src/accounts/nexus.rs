//! Biconomy Nexus with the K1 (secp256k1) validator.

use aakit_aa_types::EntryPoint;
use aakit_core::{
    call::Call,
    error::EngineError,
    owner::{AccountOwner, Owner},
};
use alloy::{
    primitives::{Address, B256, Bytes, U256, address, aliases::U192},
    sol,
    sol_types::SolCall,
};

use super::{
    DUMMY_SIGNATURE, erc7579,
    nonce_key::{NEXUS_MODE_VALIDATION, nexus_nonce_key},
    personal_sign, require_key_owner, single_ecdsa,
};
use crate::{
    account_factory::AddressSource,
    smart_account::{AccountKind, FactoryData, OwnerProof, SmartAccount},
};

pub const NEXUS_K1_VALIDATOR_FACTORY: Address =
    address!("0x00000bb19a3579F4D779215dEf97AFbd0e30DB55");
pub const NEXUS_K1_VALIDATOR: Address = address!("0x00000004171351c442B202678c48D8AB5B321E8f");
pub const NEXUS_ATTESTER: Address = address!("0x000000333034E9f539ce08819E12c1b8Cb29084d");

const ATTESTER_THRESHOLD: u8 = 1;

sol! {
    function createAccount(
        address eoaOwner,
        uint256 index,
        address[] attesters,
        uint8 threshold
    ) returns (address);

    function computeAccountAddress(
        address eoaOwner,
        uint256 index,
        address[] attesters,
        uint8 threshold
    ) view returns (address);
}

#[derive(Debug, Clone)]
pub struct NexusAccount {
    owner: AccountOwner,
    chain_id: u64,
    index: U256,
    attesters: Vec<Address>,
    threshold: u8,
}

impl NexusAccount {
    pub fn new(owner: impl Into<AccountOwner>, chain_id: u64) -> Result<Self, EngineError> {
        Ok(Self {
            owner: require_key_owner(AccountKind::Nexus, owner.into())?,
            chain_id,
            index: U256::ZERO,
            attesters: vec![NEXUS_ATTESTER],
            threshold: ATTESTER_THRESHOLD,
        })
    }

    pub fn with_index(mut self, index: U256) -> Self {
        self.index = index;
        self
    }

    /// Module registry attesters checked on install.
    pub fn with_attesters(
        mut self,
        attesters: Vec<Address>,
        threshold: u8,
    ) -> Result<Self, EngineError> {
        if usize::from(threshold) > attesters.len() {
            return Err(EngineError::validation(format!(
                "Attester threshold {threshold} exceeds {} attesters",
                attesters.len()
            )));
        }
        self.attesters = attesters;
        self.threshold = threshold;
        Ok(self)
    }
}

impl SmartAccount for NexusAccount {
    fn kind(&self) -> AccountKind {
        AccountKind::Nexus
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
            factory: NEXUS_K1_VALIDATOR_FACTORY,
            calldata: computeAccountAddressCall {
                eoaOwner: self.owner.address(),
                index: self.index,
                attesters: self.attesters.clone(),
                threshold: self.threshold,
            }
            .abi_encode()
            .into(),
        }
    }

    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError> {
        Ok(Some(FactoryData {
            factory: NEXUS_K1_VALIDATOR_FACTORY,
            data: createAccountCall {
                eoaOwner: self.owner.address(),
                index: self.index,
                attesters: self.attesters.clone(),
                threshold: self.threshold,
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
        nexus_nonce_key([0; 3], NEXUS_MODE_VALIDATION, NEXUS_K1_VALIDATOR)
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
    use super::*;
    use crate::accounts::test_utils::{ANVIL_KEY_0, key, passkey};

    #[test]
    fn factory_call_carries_attesters() {
        let owner = key(ANVIL_KEY_0);
        let account = NexusAccount::new(owner.clone(), 1).unwrap();
        let factory_data = account.factory_data().unwrap().unwrap();
        let decoded = createAccountCall::abi_decode(&factory_data.data).unwrap();

        assert_eq!(decoded.eoaOwner, owner.address());
        assert_eq!(decoded.attesters, vec![NEXUS_ATTESTER]);
        assert_eq!(decoded.threshold, 1);
    }

    #[test]
    fn nonce_key_selects_k1_validator() {
        let account = NexusAccount::new(key(ANVIL_KEY_0), 1).unwrap();
        let key = account.nonce_key().to_be_bytes::<24>();
        assert_eq!(&key[..4], &[0, 0, 0, 0]);
        assert_eq!(&key[4..], NEXUS_K1_VALIDATOR.as_slice());
    }

    #[test]
    fn threshold_cannot_exceed_attesters() {
        let account = NexusAccount::new(key(ANVIL_KEY_0), 1).unwrap();
        assert!(account.clone().with_attesters(vec![], 1).is_err());
        assert!(account.with_attesters(vec![], 0).is_ok());
    }

    #[test]
    fn passkeys_are_rejected() {
        assert!(NexusAccount::new(passkey(), 1).is_err());
    }
}
