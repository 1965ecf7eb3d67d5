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

use super::{
    DUMMY_SIGNATURE, encode_direct_batch, encode_direct_call, personal_sign, require_key_owner,
    single_ecdsa,
};
use crate::{
    account_factory::AddressSource,
    smart_account::{AccountKind, FactoryData, OwnerProof, SmartAccount},
};

pub const SIMPLE_FACTORY_V0_6: Address = address!("0x9406Cc6185a346906296840746125a0E44976454");
pub const SIMPLE_FACTORY_V0_7: Address = address!("0x91E60e0613810449d098b0b5Ec8b51A0FE8c8985");

sol! {
    function createAccount(address owner, uint256 salt) returns (address);
    function getAddress(address owner, uint256 salt) view returns (address);
}

mod v06 {
    alloy::sol! {
        function executeBatch(address[] dest, bytes[] func);
    }
}

/// eth-infinitism `SimpleAccount`.
#[derive(Debug, Clone)]
pub struct SimpleAccount {
    owner: AccountOwner,
    chain_id: u64,
    entrypoint: EntryPoint,
    factory: Address,
    salt: U256,
}

impl SimpleAccount {
    pub fn new(
        owner: impl Into<AccountOwner>,
        chain_id: u64,
        version: EntryPointVersion,
    ) -> Result<Self, EngineError> {
        let factory = match version {
            EntryPointVersion::V0_6 => SIMPLE_FACTORY_V0_6,
            EntryPointVersion::V0_7 => SIMPLE_FACTORY_V0_7,
            EntryPointVersion::V0_8 => {
                return Err(EngineError::validation(
                    "SimpleAccount supports EntryPoint v0.6 and v0.7; use Simple7702Account for v0.8",
                ));
            }
        };

        Ok(Self {
            owner: require_key_owner(AccountKind::Simple, owner.into())?,
            chain_id,
            entrypoint: EntryPoint::canonical(version),
            factory,
            salt: U256::ZERO,
        })
    }

    pub fn with_salt(mut self, salt: U256) -> Self {
        self.salt = salt;
        self
    }

    pub fn with_factory(mut self, factory: Address) -> Self {
        self.factory = factory;
        self
    }
}

impl SmartAccount for SimpleAccount {
    fn kind(&self) -> AccountKind {
        AccountKind::Simple
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
        match self.entrypoint.version {
            EntryPointVersion::V0_6 => {
                if calls.iter().any(|call| !call.value.is_zero()) {
                    return Err(EngineError::validation(
                        "SimpleAccount v0.6 batches cannot transfer value",
                    ));
                }
                Ok(v06::executeBatchCall {
                    dest: calls.iter().map(|call| call.to).collect(),
                    func: calls.iter().map(|call| call.data.clone()).collect(),
                }
                .abi_encode()
                .into())
            }
            _ => Ok(encode_direct_batch(calls)),
        }
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
    use alloy::primitives::{Signature, hex};

    use super::*;
    use crate::accounts::test_utils::{ANVIL_KEY_0, key, passkey};

    #[test]
    fn factory_data_targets_create_account() {
        let account = SimpleAccount::new(key(ANVIL_KEY_0), 1, EntryPointVersion::V0_7)
            .unwrap()
            .with_salt(U256::from(3));
        let factory_data = account.factory_data().unwrap().unwrap();

        assert_eq!(factory_data.factory, SIMPLE_FACTORY_V0_7);
        assert_eq!(&factory_data.data[..4], &hex!("5fbfb9cf"));
        assert_eq!(factory_data.data.len(), 4 + 64);
        assert_eq!(factory_data.init_code().len(), 20 + 4 + 64);
    }

    #[test]
    fn encodes_execute_and_batches() {
        let account = SimpleAccount::new(key(ANVIL_KEY_0), 1, EntryPointVersion::V0_6).unwrap();
        let call = Call::new(Address::repeat_byte(0x22), U256::from(5), vec![0xde, 0xad]);

        assert_eq!(&account.encode_call(&call).unwrap()[..4], &hex!("b61d27f6"));

        let transfer_free = Call::new(Address::repeat_byte(0x22), U256::ZERO, vec![0x01]);
        let batch = account
            .encode_batch(&[transfer_free.clone(), transfer_free])
            .unwrap();
        assert_eq!(&batch[..4], &hex!("18dfb3c7"));

        assert!(account.encode_batch(&[call.clone(), call]).is_err());
    }

    #[test]
    fn v07_batches_carry_values() {
        let account = SimpleAccount::new(key(ANVIL_KEY_0), 1, EntryPointVersion::V0_7).unwrap();
        let call = Call::new(Address::repeat_byte(0x22), U256::from(5), vec![]);
        let batch = account.encode_batch(&[call.clone(), call]).unwrap();
        assert_eq!(&batch[..4], &hex!("47e1da2a"));
    }

    #[test]
    fn signs_the_personal_digest() {
        let owner = key(ANVIL_KEY_0);
        let account = SimpleAccount::new(owner.clone(), 1, EntryPointVersion::V0_7).unwrap();
        let digest = B256::repeat_byte(0x5a);

        let signature = account.sign_and_encode(digest).unwrap();
        assert_eq!(signature.len(), account.stub_signature().len());

        let recovered = Signature::try_from(signature.as_ref())
            .unwrap()
            .recover_address_from_msg(digest.as_slice())
            .unwrap();
        assert_eq!(recovered, owner.address());
    }

    #[test]
    fn passkeys_are_rejected() {
        assert!(matches!(
            SimpleAccount::new(passkey(), 1, EntryPointVersion::V0_7),
            Err(EngineError::UnsupportedOperation { .. })
        ));
    }
}
