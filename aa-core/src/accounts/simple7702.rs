use aakit_aa_types::EntryPoint;
use aakit_core::{
    call::Call,
    error::EngineError,
    owner::{AccountOwner, Owner},
};
use aakit_eip7702_core::constants::SIMPLE_7702_DELEGATE;
use alloy::{
    primitives::{Address, B256, Bytes},
    sol,
    sol_types::SolCall,
};

use super::{DUMMY_SIGNATURE, encode_direct_call, raw_sign, require_key_owner, single_ecdsa};
use crate::{
    account_factory::AddressSource,
    smart_account::{AccountKind, FactoryData, OwnerProof, SmartAccount},
};

sol! {
    struct Call7702 {
        address target;
        uint256 value;
        bytes data;
    }

    function executeBatch(Call7702[] calls);
}

/// eth-infinitism `Simple7702Account`, run from the owner's EOA under EntryPoint v0.8.
#[derive(Debug, Clone)]
pub struct Simple7702Account {
    owner: AccountOwner,
    chain_id: u64,
    delegate: Address,
}

impl Simple7702Account {
    pub fn new(owner: impl Into<AccountOwner>, chain_id: u64) -> Result<Self, EngineError> {
        Ok(Self {
            owner: require_key_owner(AccountKind::Simple7702, owner.into())?,
            chain_id,
            delegate: SIMPLE_7702_DELEGATE,
        })
    }

    pub fn with_delegate(mut self, delegate: Address) -> Self {
        self.delegate = delegate;
        self
    }
}

impl SmartAccount for Simple7702Account {
    fn kind(&self) -> AccountKind {
        AccountKind::Simple7702
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn entrypoint(&self) -> EntryPoint {
        EntryPoint::V0_8
    }

    fn owners(&self) -> &[AccountOwner] {
        std::slice::from_ref(&self.owner)
    }

    fn address_source(&self) -> AddressSource {
        AddressSource::Known(self.owner.address())
    }

    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError> {
        Ok(None)
    }

    fn encode_call(&self, call: &Call) -> Result<Bytes, EngineError> {
        Ok(encode_direct_call(call))
    }

    fn encode_batch(&self, calls: &[Call]) -> Result<Bytes, EngineError> {
        Ok(executeBatchCall {
            calls: calls
                .iter()
                .map(|call| Call7702 {
                    target: call.to,
                    value: call.value,
                    data: call.data.clone(),
                })
                .collect(),
        }
        .abi_encode()
        .into())
    }

    fn stub_signature(&self) -> Bytes {
        Bytes::from(DUMMY_SIGNATURE)
    }

    /// The v0.8 user operation hash is already an EIP-712 digest.
    fn sign(&self, digest: B256) -> Result<Vec<OwnerProof>, EngineError> {
        Ok(vec![raw_sign(&self.owner, digest)?])
    }

    fn encode_signature(&self, proofs: Vec<OwnerProof>) -> Result<Bytes, EngineError> {
        Ok(Bytes::from(single_ecdsa(proofs)?))
    }

    fn eip7702_delegate(&self) -> Option<Address> {
        Some(self.delegate)
    }
}
