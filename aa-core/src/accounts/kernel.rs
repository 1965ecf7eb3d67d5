//! ZeroDev Kernel: v0.2.4 on EntryPoint v0.6, v0.3.x on EntryPoint v0.7, and
//! the v0.3.3 EIP-7702 delegate.

use aakit_aa_types::EntryPoint;
use aakit_core::{
    call::Call,
    error::EngineError,
    owner::{AccountOwner, Owner},
};
use aakit_eip7702_core::constants::KERNEL_V3_3_DELEGATE;
use alloy::{
    primitives::{Address, B256, Bytes, FixedBytes, U256, address, aliases::U192, keccak256},
    sol_types::{SolCall, SolValue},
};
use serde::{Deserialize, Serialize};

use super::{
    DUMMY_SIGNATURE, erc7579,
    nonce_key::{KERNEL_MODE_DEFAULT, KERNEL_TYPE_VALIDATOR, kernel_nonce_key},
    personal_sign, prefixed, require_key_owner, single_ecdsa,
};
use crate::{
    account_factory::AddressSource,
    smart_account::{AccountKind, FactoryData, OwnerProof, SmartAccount},
    webauthn::{
        WEBAUTHN_VERIFICATION_GAS_FLOOR, encode_kernel_signature, has_p256_precompile,
        stub_signature,
    },
};

pub const KERNEL_V2_FACTORY: Address = address!("0x5de4839a76cf55d0c90e2061ef4386d962E15ae3");
pub const KERNEL_V2_4_IMPLEMENTATION: Address =
    address!("0xd3082872F8B06073A021b4602e022d5A070d7cfC");
pub const KERNEL_V2_ECDSA_VALIDATOR: Address =
    address!("0xd9AB5096a832b9ce79914329DAEE236f8Eea0390");

pub const KERNEL_META_FACTORY: Address = address!("0xd703aaE79538628d27099B8c4f621bE4CCd142d5");
pub const KERNEL_V3_0_FACTORY: Address = address!("0x6723b44Abeec4E71eBE3232BD5B455805baDD22f");
pub const KERNEL_V3_1_FACTORY: Address = address!("0xaac5D4240AF87249B3f71BC8E4A2cae074A3E419");
pub const KERNEL_V3_ECDSA_VALIDATOR: Address =
    address!("0x845ADb2C711129d4f3966735eD98a9F09fC4cE57");
pub const KERNEL_V3_WEBAUTHN_VALIDATOR: Address =
    address!("0x7ab16Ff354AcB328452F1D445b3Ddee9a91e9e69");

/// Kernel v0.2 signature mode that routes to the default validator.
const KERNEL_V2_SUDO_MODE: [u8; 4] = [0, 0, 0, 0];

mod v2 {
    alloy::sol! {
        struct Call {
            address to;
            uint256 value;
            bytes data;
        }

        function initialize(address defaultValidator, bytes data);
        function createAccount(address implementation, bytes data, uint256 index) returns (address);
        function getAccountAddress(bytes data, uint256 index) view returns (address);
        function execute(address to, uint256 value, bytes data, uint8 operation);
        function executeBatch(Call[] calls);
    }
}

mod v3 {
    alloy::sol! {
        function deployWithFactory(address factory, bytes createData, bytes32 salt) returns (address);
        function getAddress(bytes data, bytes32 salt) view returns (address);
    }

    pub mod v3_0 {
        alloy::sol! {
            function initialize(bytes21 rootValidator, address hook, bytes validatorData, bytes hookData);
        }
    }

    pub mod v3_1 {
        alloy::sol! {
            function initialize(
                bytes21 rootValidator,
                address hook,
                bytes validatorData,
                bytes hookData,
                bytes[] initConfig
            );
        }
    }
}

/// `Operation.Call` for Kernel v0.2 `execute`.
const OPERATION_CALL: u8 = 0;

/// Kernel v0.2.4 with the ECDSA validator as default validator.
#[derive(Debug, Clone)]
pub struct KernelV2Account {
    owner: AccountOwner,
    chain_id: u64,
    index: U256,
}

impl KernelV2Account {
    pub fn new(owner: impl Into<AccountOwner>, chain_id: u64) -> Result<Self, EngineError> {
        Ok(Self {
            owner: require_key_owner(AccountKind::KernelV2, owner.into())?,
            chain_id,
            index: U256::ZERO,
        })
    }

    pub fn with_index(mut self, index: U256) -> Self {
        self.index = index;
        self
    }

    fn initializer(&self) -> Bytes {
        v2::initializeCall {
            defaultValidator: KERNEL_V2_ECDSA_VALIDATOR,
            data: Bytes::copy_from_slice(self.owner.address().as_slice()),
        }
        .abi_encode()
        .into()
    }
}

impl SmartAccount for KernelV2Account {
    fn kind(&self) -> AccountKind {
        AccountKind::KernelV2
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
            factory: KERNEL_V2_FACTORY,
            calldata: v2::getAccountAddressCall {
                data: self.initializer(),
                index: self.index,
            }
            .abi_encode()
            .into(),
        }
    }

    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError> {
        Ok(Some(FactoryData {
            factory: KERNEL_V2_FACTORY,
            data: v2::createAccountCall {
                implementation: KERNEL_V2_4_IMPLEMENTATION,
                data: self.initializer(),
                index: self.index,
            }
            .abi_encode()
            .into(),
        }))
    }

    fn encode_call(&self, call: &Call) -> Result<Bytes, EngineError> {
        Ok(v2::executeCall {
            to: call.to,
            value: call.value,
            data: call.data.clone(),
            operation: OPERATION_CALL,
        }
        .abi_encode()
        .into())
    }

    fn encode_batch(&self, calls: &[Call]) -> Result<Bytes, EngineError> {
        Ok(v2::executeBatchCall {
            calls: calls
                .iter()
                .map(|call| v2::Call {
                    to: call.to,
                    value: call.value,
                    data: call.data.clone(),
                })
                .collect(),
        }
        .abi_encode()
        .into())
    }

    fn stub_signature(&self) -> Bytes {
        prefixed(&KERNEL_V2_SUDO_MODE, &DUMMY_SIGNATURE)
    }

    fn sign(&self, digest: B256) -> Result<Vec<OwnerProof>, EngineError> {
        Ok(vec![personal_sign(&self.owner, digest)?])
    }

    fn encode_signature(&self, proofs: Vec<OwnerProof>) -> Result<Bytes, EngineError> {
        Ok(prefixed(&KERNEL_V2_SUDO_MODE, &single_ecdsa(proofs)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelVersion {
    #[serde(rename = "0.3.0")]
    V3_0,
    #[serde(rename = "0.3.1")]
    V3_1,
}

impl KernelVersion {
    pub fn factory(self) -> Address {
        match self {
            KernelVersion::V3_0 => KERNEL_V3_0_FACTORY,
            KernelVersion::V3_1 => KERNEL_V3_1_FACTORY,
        }
    }
}

/// Kernel v0.3 with an ECDSA or WebAuthn root validator.
#[derive(Debug, Clone)]
pub struct KernelV3Account {
    owner: AccountOwner,
    chain_id: u64,
    version: KernelVersion,
    validator_data: Bytes,
    index: B256,
    nonce_salt: u16,
}

impl KernelV3Account {
    pub fn new(
        owner: impl Into<AccountOwner>,
        chain_id: u64,
        version: KernelVersion,
    ) -> Result<Self, EngineError> {
        let owner = owner.into();
        let validator_data = validator_data(&owner)?;
        Ok(Self {
            owner,
            chain_id,
            version,
            validator_data,
            index: B256::ZERO,
            nonce_salt: 0,
        })
    }

    pub fn with_index(mut self, index: U256) -> Self {
        self.index = B256::from(index);
        self
    }

    /// Selects one of the parallel nonce sequences of the root validator.
    pub fn with_nonce_salt(mut self, nonce_salt: u16) -> Self {
        self.nonce_salt = nonce_salt;
        self
    }

    pub fn version(&self) -> KernelVersion {
        self.version
    }

    pub fn validator(&self) -> Address {
        match self.owner {
            AccountOwner::Key(_) => KERNEL_V3_ECDSA_VALIDATOR,
            AccountOwner::Passkey(_) => KERNEL_V3_WEBAUTHN_VALIDATOR,
        }
    }

    fn root_validator(&self) -> FixedBytes<21> {
        let mut id = FixedBytes::<21>::ZERO;
        id[0] = KERNEL_TYPE_VALIDATOR;
        id[1..].copy_from_slice(self.validator().as_slice());
        id
    }

    fn initializer(&self) -> Bytes {
        let validator_data = self.validator_data.clone();
        let encoded = match self.version {
            KernelVersion::V3_0 => v3::v3_0::initializeCall {
                rootValidator: self.root_validator(),
                hook: Address::ZERO,
                validatorData: validator_data,
                hookData: Bytes::new(),
            }
            .abi_encode(),
            KernelVersion::V3_1 => v3::v3_1::initializeCall {
                rootValidator: self.root_validator(),
                hook: Address::ZERO,
                validatorData: validator_data,
                hookData: Bytes::new(),
                initConfig: vec![],
            }
            .abi_encode(),
        };
        encoded.into()
    }

    fn use_precompile(&self) -> bool {
        has_p256_precompile(self.chain_id)
    }
}

impl SmartAccount for KernelV3Account {
    fn kind(&self) -> AccountKind {
        AccountKind::KernelV3
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
            factory: self.version.factory(),
            calldata: v3::getAddressCall {
                data: self.initializer(),
                salt: self.index,
            }
            .abi_encode()
            .into(),
        }
    }

    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError> {
        Ok(Some(FactoryData {
            factory: KERNEL_META_FACTORY,
            data: v3::deployWithFactoryCall {
                factory: self.version.factory(),
                createData: self.initializer(),
                salt: self.index,
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
        kernel_nonce_key(
            KERNEL_MODE_DEFAULT,
            KERNEL_TYPE_VALIDATOR,
            self.validator(),
            self.nonce_salt,
        )
    }

    fn stub_signature(&self) -> Bytes {
        match &self.owner {
            AccountOwner::Key(_) => Bytes::from(DUMMY_SIGNATURE),
            AccountOwner::Passkey(owner) => encode_kernel_signature(
                &stub_signature(&owner.credential().origin),
                self.use_precompile(),
            ),
        }
    }

    fn sign(&self, digest: B256) -> Result<Vec<OwnerProof>, EngineError> {
        match &self.owner {
            AccountOwner::Key(_) => Ok(vec![personal_sign(&self.owner, digest)?]),
            AccountOwner::Passkey(owner) => {
                Ok(vec![OwnerProof::WebAuthn(owner.sign_webauthn(digest)?)])
            }
        }
    }

    fn encode_signature(&self, proofs: Vec<OwnerProof>) -> Result<Bytes, EngineError> {
        match proofs.as_slice() {
            [OwnerProof::WebAuthn(signature)] => {
                Ok(encode_kernel_signature(signature, self.use_precompile()))
            }
            _ => Ok(Bytes::from(single_ecdsa(proofs)?)),
        }
    }

    fn verification_gas_floor(&self) -> Option<U256> {
        (self.is_webauthn() && !self.use_precompile())
            .then(|| U256::from(WEBAUTHN_VERIFICATION_GAS_FLOOR))
    }
}

/// ECDSA: the owner address. WebAuthn: `abi.encode((x, y), keccak256(credentialId))`.
fn validator_data(owner: &AccountOwner) -> Result<Bytes, EngineError> {
    match owner {
        AccountOwner::Key(owner) => Ok(Bytes::copy_from_slice(owner.address().as_slice())),
        AccountOwner::Passkey(owner) => {
            let id_hash = keccak256(owner.credential().id_bytes()?);
            Ok(((owner.x(), owner.y()), id_hash).abi_encode_params().into())
        }
    }
}

/// Kernel v0.3.3 delegated from the owner's EOA. The EOA itself is the root
/// validator, so the nonce key stays zero.
#[derive(Debug, Clone)]
pub struct Kernel7702Account {
    owner: AccountOwner,
    chain_id: u64,
    delegate: Address,
}

impl Kernel7702Account {
    pub fn new(owner: impl Into<AccountOwner>, chain_id: u64) -> Result<Self, EngineError> {
        Ok(Self {
            owner: require_key_owner(AccountKind::Kernel7702, owner.into())?,
            chain_id,
            delegate: KERNEL_V3_3_DELEGATE,
        })
    }

    pub fn with_delegate(mut self, delegate: Address) -> Self {
        self.delegate = delegate;
        self
    }
}

impl SmartAccount for Kernel7702Account {
    fn kind(&self) -> AccountKind {
        AccountKind::Kernel7702
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
        AddressSource::Known(self.owner.address())
    }

    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError> {
        Ok(None)
    }

    fn encode_call(&self, call: &Call) -> Result<Bytes, EngineError> {
        Ok(erc7579::encode_single(call))
    }

    fn encode_batch(&self, calls: &[Call]) -> Result<Bytes, EngineError> {
        Ok(erc7579::encode_batch(calls))
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

    fn eip7702_delegate(&self) -> Option<Address> {
        Some(self.delegate)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Signature, hex};

    use super::*;
    use crate::accounts::test_utils::{ANVIL_KEY_0, key, passkey};

    #[test]
    fn v2_signature_carries_sudo_mode() {
        let owner = key(ANVIL_KEY_0);
        let account = KernelV2Account::new(owner.clone(), 1).unwrap();
        let digest = B256::repeat_byte(0x42);

        let signature = account.sign_and_encode(digest).unwrap();
        assert_eq!(signature.len(), 69);
        assert_eq!(signature.len(), account.stub_signature().len());
        assert_eq!(&signature[..4], &[0, 0, 0, 0]);

        let recovered = Signature::try_from(&signature[4..])
            .unwrap()
            .recover_address_from_msg(digest.as_slice())
            .unwrap();
        assert_eq!(recovered, owner.address());
    }

    #[test]
    fn v2_factory_data_and_calls() {
        let account = KernelV2Account::new(key(ANVIL_KEY_0), 1).unwrap();
        let factory_data = account.factory_data().unwrap().unwrap();
        assert_eq!(factory_data.factory, KERNEL_V2_FACTORY);
        assert_eq!(&factory_data.data[..4], &hex!("296601cd"));

        let call = Call::new(Address::repeat_byte(3), U256::from(1), vec![]);
        assert_eq!(&account.encode_call(&call).unwrap()[..4], &hex!("51945447"));
        assert_eq!(
            &account.encode_batch(&[call.clone(), call]).unwrap()[..4],
            &hex!("34fcd5be")
        );
    }

    #[test]
    fn v3_ecdsa_root_validator() {
        let owner = key(ANVIL_KEY_0);
        let account = KernelV3Account::new(owner.clone(), 1, KernelVersion::V3_1)
            .unwrap()
            .with_nonce_salt(1);

        let factory_data = account.factory_data().unwrap().unwrap();
        assert_eq!(factory_data.factory, KERNEL_META_FACTORY);

        let deploy = v3::deployWithFactoryCall::abi_decode(&factory_data.data).unwrap();
        assert_eq!(deploy.factory, KERNEL_V3_1_FACTORY);
        let init = v3::v3_1::initializeCall::abi_decode(&deploy.createData).unwrap();
        assert_eq!(init.rootValidator[0], KERNEL_TYPE_VALIDATOR);
        assert_eq!(&init.rootValidator[1..], KERNEL_V3_ECDSA_VALIDATOR.as_slice());
        assert_eq!(init.validatorData.as_ref(), owner.address().as_slice());

        let mut expected_key = [0u8; 24];
        expected_key[1] = 0x01;
        expected_key[2..22].copy_from_slice(KERNEL_V3_ECDSA_VALIDATOR.as_slice());
        expected_key[23] = 0x01;
        assert_eq!(account.nonce_key().to_be_bytes::<24>(), expected_key);
        assert!(account.verification_gas_floor().is_none());
    }

    #[test]
    fn v3_0_initializer_has_no_init_config() {
        let account = KernelV3Account::new(key(ANVIL_KEY_0), 1, KernelVersion::V3_0).unwrap();
        let factory_data = account.factory_data().unwrap().unwrap();
        let deploy = v3::deployWithFactoryCall::abi_decode(&factory_data.data).unwrap();
        assert_eq!(deploy.factory, KERNEL_V3_0_FACTORY);
        assert!(v3::v3_0::initializeCall::abi_decode(&deploy.createData).is_ok());
    }

    #[test]
    fn v3_calls_use_erc7579() {
        let account = KernelV3Account::new(key(ANVIL_KEY_0), 1, KernelVersion::V3_1).unwrap();
        let call = Call::new(Address::repeat_byte(3), U256::ZERO, vec![1]);
        assert_eq!(&account.encode_calls(&[call.clone()]).unwrap()[..4], &hex!("e9ae5c53"));
        assert_eq!(&account.encode_calls(&[call.clone(), call]).unwrap()[..4], &hex!("e9ae5c53"));
    }

    #[test]
    fn v3_passkey_uses_webauthn_validator() {
        let owner = passkey();
        let account = KernelV3Account::new(owner.clone(), 1, KernelVersion::V3_1).unwrap();

        assert_eq!(account.validator(), KERNEL_V3_WEBAUTHN_VALIDATOR);
        assert!(account.is_webauthn());
        assert!(!account.has_fixed_signature_length());
        // mainnet has no P256 precompile
        assert_eq!(
            account.verification_gas_floor(),
            Some(U256::from(WEBAUTHN_VERIFICATION_GAS_FLOOR))
        );

        let validator_data = &account.validator_data;
        assert_eq!(validator_data.len(), 96);
        assert_eq!(U256::from_be_slice(&validator_data[..32]), owner.x());
        assert_eq!(U256::from_be_slice(&validator_data[32..64]), owner.y());
    }

    #[test]
    fn v3_passkey_signature_matches_stub_length() {
        let account = KernelV3Account::new(passkey(), 8453, KernelVersion::V3_1).unwrap();
        assert!(account.verification_gas_floor().is_none());

        let signature = account.sign_and_encode(B256::repeat_byte(0x31)).unwrap();
        assert_eq!(signature.len(), account.stub_signature().len());
        // usePrecompile is the last head word
        assert_eq!(signature[191], 1);
    }

    #[test]
    fn kernel_7702_lives_at_the_eoa() {
        let owner = key(ANVIL_KEY_0);
        let account = Kernel7702Account::new(owner.clone(), 1).unwrap();
        assert_eq!(account.address_source().local(), Some(owner.address()));
        assert_eq!(account.eip7702_delegate(), Some(KERNEL_V3_3_DELEGATE));
        assert_eq!(account.nonce_key(), U192::ZERO);
        assert!(Kernel7702Account::new(passkey(), 1).is_err());
    }
}
