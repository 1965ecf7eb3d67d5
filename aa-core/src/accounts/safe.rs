//! Safe 1.4.1 with the Safe4337Module, owned by any mix of keys and at most
//! one passkey (through the WebAuthn shared signer).

use aakit_aa_types::{
    EntryPoint, EntryPointVersion, UserOpError, VersionedUserOp,
    userop::{packed_init_code, packed_paymaster_and_data, to_u128},
};
use aakit_core::{
    call::Call,
    error::EngineError,
    owner::{AccountOwner, DigestScheme, Owner, OwnerSignature},
};
use alloy::{
    primitives::{
        Address, B256, Bytes, U256, address,
        aliases::{U48, U176, U192},
        keccak256,
    },
    sol,
    sol_types::{SolCall, SolStruct, eip712_domain},
};

use super::{DUMMY_SIGNATURE, raw_sign};
use crate::{
    account_factory::AddressSource,
    smart_account::{AccountKind, FactoryData, OwnerProof, SmartAccount},
    webauthn::{encode_safe_signature, stub_safe_signature},
};

pub const SAFE_SINGLETON_L2: Address = address!("0x29fcB43b46531BcA003ddC8FCB67FFE91900C762");
pub const SAFE_PROXY_FACTORY: Address = address!("0x4e1DCf7AD4e460CfD30791CCC4F9c8a4f820ec67");
pub const SAFE_MULTI_SEND: Address = address!("0x38869bf66a61cF6bDB996A6aE40D5853Fd43B526");
pub const SAFE_MULTI_SEND_CALL_ONLY: Address =
    address!("0x9641d764fc13c8B624c04430C7356C1C7C8102e2");

pub const SAFE_4337_MODULE_V0_6: Address = address!("0xa581c4A4DB7175302464fF3C06380BC3270b4037");
pub const SAFE_ADD_MODULES_LIB_V0_6: Address =
    address!("0x8EcD4ec46D4D2a6B64fE960B3D64e8B94B2234eb");
pub const SAFE_4337_MODULE_V0_7: Address = address!("0x75cf11467937ce3F2f357CE24ffc3DBF8fD5c226");
pub const SAFE_ADD_MODULES_LIB_V0_7: Address =
    address!("0x2dd68b007B46fBe91B9A7c3EDa5A7a1063cB5b47");

pub const SAFE_WEBAUTHN_SHARED_SIGNER: Address =
    address!("0x94a4F6affBd8975951142c3999aEAB7ecee555c2");
pub const SAFE_FCL_P256_VERIFIER: Address =
    address!("0x445a0683e494ea0c5AF3E83c5159fBE47Cf9e765");

/// RIP-7212 precompile address, tried before the fallback verifier.
const P256_PRECOMPILE: u16 = 0x0100;

const OPERATION_CALL: u8 = 0;
const OPERATION_DELEGATECALL: u8 = 1;

/// Largest value a `uint48` timestamp can hold.
const MAX_U48: u64 = (1 << 48) - 1;

sol! {
    function setup(
        address[] owners,
        uint256 threshold,
        address to,
        bytes data,
        address fallbackHandler,
        address paymentToken,
        uint256 payment,
        address paymentReceiver
    );

    function enableModules(address[] modules);
    function multiSend(bytes transactions);
    function proxyCreationCode() view returns (bytes);
    function createProxyWithNonce(address singleton, bytes initializer, uint256 saltNonce) returns (address);
    function executeUserOp(address to, uint256 value, bytes data, uint8 operation);

    struct SharedSigner {
        uint256 x;
        uint256 y;
        uint176 verifiers;
    }

    function configure(SharedSigner signer);
}

mod v06 {
    alloy::sol! {
        struct SafeOp {
            address safe;
            uint256 nonce;
            bytes initCode;
            bytes callData;
            uint256 callGasLimit;
            uint256 verificationGasLimit;
            uint256 preVerificationGas;
            uint256 maxFeePerGas;
            uint256 maxPriorityFeePerGas;
            bytes paymasterAndData;
            uint48 validAfter;
            uint48 validUntil;
            address entryPoint;
        }
    }
}

mod v07 {
    alloy::sol! {
        struct SafeOp {
            address safe;
            uint256 nonce;
            bytes initCode;
            bytes callData;
            uint128 verificationGasLimit;
            uint128 callGasLimit;
            uint256 preVerificationGas;
            uint128 maxPriorityFeePerGas;
            uint128 maxFeePerGas;
            bytes paymasterAndData;
            uint48 validAfter;
            uint48 validUntil;
            address entryPoint;
        }
    }
}

/// Owners, threshold and the knobs that feed the counterfactual address.
#[derive(Debug, Clone)]
pub struct SafeConfig {
    pub owners: Vec<AccountOwner>,
    pub threshold: usize,
    pub salt_nonce: U256,
    pub entrypoint: EntryPointVersion,
    /// Seconds since epoch; zero means no lower bound.
    pub valid_after: u64,
    /// Seconds since epoch; zero means no expiry.
    pub valid_until: u64,
    pub nonce_key: U192,
}

impl SafeConfig {
    pub fn new(owners: Vec<AccountOwner>, threshold: usize) -> Self {
        Self {
            owners,
            threshold,
            salt_nonce: U256::ZERO,
            entrypoint: EntryPointVersion::V0_7,
            valid_after: 0,
            valid_until: 0,
            nonce_key: U192::ZERO,
        }
    }

    pub fn single(owner: impl Into<AccountOwner>) -> Self {
        Self::new(vec![owner.into()], 1)
    }

    pub fn with_salt_nonce(mut self, salt_nonce: U256) -> Self {
        self.salt_nonce = salt_nonce;
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: EntryPointVersion) -> Self {
        self.entrypoint = entrypoint;
        self
    }

    pub fn with_validity(mut self, valid_after: u64, valid_until: u64) -> Self {
        self.valid_after = valid_after;
        self.valid_until = valid_until;
        self
    }

    pub fn with_nonce_key(mut self, nonce_key: U192) -> Self {
        self.nonce_key = nonce_key;
        self
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.owners.is_empty() {
            return Err(EngineError::validation("A Safe needs at least one owner"));
        }
        if self.threshold == 0 || self.threshold > self.owners.len() {
            return Err(EngineError::validation(format!(
                "Threshold {} is outside 1..={}",
                self.threshold,
                self.owners.len()
            )));
        }
        if self.owners.iter().filter(|owner| owner.is_passkey()).count() > 1 {
            return Err(EngineError::validation(
                "A Safe supports at most one passkey owner",
            ));
        }
        if self.valid_after > MAX_U48 || self.valid_until > MAX_U48 {
            return Err(EngineError::validation("Validity bounds must fit in 48 bits"));
        }
        if self.valid_until != 0 && self.valid_until <= self.valid_after {
            return Err(EngineError::validation(
                "validUntil must be later than validAfter",
            ));
        }
        Ok(())
    }
}

/// The address a Safe sees for `owner`: a passkey is represented by the
/// shared signer, which reads the key from the Safe's storage.
fn safe_owner_address(owner: &AccountOwner) -> Address {
    match owner {
        AccountOwner::Key(key) => key.address(),
        AccountOwner::Passkey(_) => SAFE_WEBAUTHN_SHARED_SIGNER,
    }
}

/// `operation(1) ‖ to(20) ‖ value(32) ‖ dataLength(32) ‖ data` per transaction.
fn multi_send(transactions: &[(u8, Address, U256, &[u8])]) -> Bytes {
    let mut packed = Vec::new();
    for (operation, to, value, data) in transactions {
        packed.push(*operation);
        packed.extend_from_slice(to.as_slice());
        packed.extend_from_slice(&value.to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());
        packed.extend_from_slice(data);
    }
    multiSendCall {
        transactions: packed.into(),
    }
    .abi_encode()
    .into()
}

/// One entry of the Safe signature blob.
enum SignaturePart {
    /// 65-byte `r ‖ s ‖ v`, placed inline.
    Ecdsa([u8; 65]),
    /// EIP-1271 signature data, placed in the dynamic region.
    Contract(Bytes),
}

#[derive(Debug, Clone)]
pub struct SafeAccount {
    config: SafeConfig,
    chain_id: u64,
    module: Address,
    add_modules_lib: Address,
    initializer: Bytes,
}

impl SafeAccount {
    pub fn new(config: SafeConfig, chain_id: u64) -> Result<Self, EngineError> {
        config.validate()?;

        let (module, add_modules_lib) = match config.entrypoint {
            EntryPointVersion::V0_6 => (SAFE_4337_MODULE_V0_6, SAFE_ADD_MODULES_LIB_V0_6),
            EntryPointVersion::V0_7 => (SAFE_4337_MODULE_V0_7, SAFE_ADD_MODULES_LIB_V0_7),
            EntryPointVersion::V0_8 => {
                return Err(EngineError::validation(
                    "The Safe4337Module supports EntryPoint v0.6 and v0.7",
                ));
            }
        };

        let owner_addresses: Vec<Address> = config.owners.iter().map(safe_owner_address).collect();
        for (i, owner) in owner_addresses.iter().enumerate() {
            if owner_addresses[..i].contains(owner) {
                return Err(EngineError::validation(format!(
                    "Duplicate Safe owner {owner}"
                )));
            }
        }

        let initializer = initializer(&config, owner_addresses, module, add_modules_lib);
        Ok(Self {
            config,
            chain_id,
            module,
            add_modules_lib,
            initializer,
        })
    }

    pub fn config(&self) -> &SafeConfig {
        &self.config
    }

    pub fn module(&self) -> Address {
        self.module
    }

    pub fn add_modules_lib(&self) -> Address {
        self.add_modules_lib
    }

    pub fn initializer(&self) -> &Bytes {
        &self.initializer
    }

    /// CREATE2 salt used by the proxy factory.
    fn proxy_salt(&self) -> B256 {
        let mut preimage = keccak256(&self.initializer).to_vec();
        preimage.extend_from_slice(&self.config.salt_nonce.to_be_bytes::<32>());
        keccak256(preimage)
    }

    /// The owners asked to sign, in configuration order.
    fn signing_owners(&self) -> &[AccountOwner] {
        &self.config.owners[..self.config.threshold]
    }

    /// `validAfter(6) ‖ validUntil(6) ‖ signatures`, with signatures sorted by
    /// signer and contract signatures in the dynamic region.
    fn pack_signatures(
        &self,
        mut parts: Vec<(Address, SignaturePart)>,
    ) -> Result<Bytes, EngineError> {
        parts.sort_by_key(|(signer, _)| *signer);
        if parts.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Err(EngineError::InvalidSignature {
                message: "Safe signatures contain the same signer twice".to_string(),
            });
        }

        let static_len = parts.len() * 65;
        let mut static_part = Vec::with_capacity(static_len);
        let mut dynamic_part = Vec::new();

        for (signer, part) in parts {
            match part {
                SignaturePart::Ecdsa(signature) => static_part.extend_from_slice(&signature),
                SignaturePart::Contract(data) => {
                    let offset = static_len + dynamic_part.len();
                    static_part.extend_from_slice(signer.into_word().as_slice());
                    static_part.extend_from_slice(&U256::from(offset).to_be_bytes::<32>());
                    static_part.push(0);

                    dynamic_part.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());
                    dynamic_part.extend_from_slice(&data);
                }
            }
        }

        let mut signature = Vec::with_capacity(12 + static_part.len() + dynamic_part.len());
        signature.extend_from_slice(&self.config.valid_after.to_be_bytes()[2..]);
        signature.extend_from_slice(&self.config.valid_until.to_be_bytes()[2..]);
        signature.extend_from_slice(&static_part);
        signature.extend_from_slice(&dynamic_part);
        Ok(signature.into())
    }

    fn safe_op_digest(&self, user_op: &VersionedUserOp) -> Result<B256, EngineError> {
        let domain = eip712_domain! {
            chain_id: self.chain_id,
            verifying_contract: self.module,
        };
        let entry_point = self.entrypoint().address;
        let valid_after = U48::from(self.config.valid_after);
        let valid_until = U48::from(self.config.valid_until);

        match (user_op, self.config.entrypoint) {
            (VersionedUserOp::V0_6(op), EntryPointVersion::V0_6) => Ok(v06::SafeOp {
                safe: op.sender,
                nonce: op.nonce,
                initCode: op.init_code.clone(),
                callData: op.call_data.clone(),
                callGasLimit: op.call_gas_limit,
                verificationGasLimit: op.verification_gas_limit,
                preVerificationGas: op.pre_verification_gas,
                maxFeePerGas: op.max_fee_per_gas,
                maxPriorityFeePerGas: op.max_priority_fee_per_gas,
                paymasterAndData: op.paymaster_and_data.clone(),
                validAfter: valid_after,
                validUntil: valid_until,
                entryPoint: entry_point,
            }
            .eip712_signing_hash(&domain)),
            (VersionedUserOp::V0_7(op), EntryPointVersion::V0_7) => Ok(v07::SafeOp {
                safe: op.sender,
                nonce: op.nonce,
                initCode: packed_init_code(op),
                callData: op.call_data.clone(),
                verificationGasLimit: to_u128(op.verification_gas_limit, "verification_gas_limit")?,
                callGasLimit: to_u128(op.call_gas_limit, "call_gas_limit")?,
                preVerificationGas: op.pre_verification_gas,
                maxPriorityFeePerGas: to_u128(
                    op.max_priority_fee_per_gas,
                    "max_priority_fee_per_gas",
                )?,
                maxFeePerGas: to_u128(op.max_fee_per_gas, "max_fee_per_gas")?,
                paymasterAndData: packed_paymaster_and_data(op)?,
                validAfter: valid_after,
                validUntil: valid_until,
                entryPoint: entry_point,
            }
            .eip712_signing_hash(&domain)),
            (_, version) => Err(UserOpError::VersionMismatch { version }.into()),
        }
    }
}

fn initializer(
    config: &SafeConfig,
    owners: Vec<Address>,
    module: Address,
    add_modules_lib: Address,
) -> Bytes {
    let enable_modules: Bytes = enableModulesCall {
        modules: vec![module],
    }
    .abi_encode()
    .into();

    let passkey = config.owners.iter().find_map(AccountOwner::as_passkey);
    let (to, data) = match passkey {
        None => (add_modules_lib, enable_modules),
        Some(passkey) => {
            let mut verifiers = [0u8; 22];
            verifiers[..2].copy_from_slice(&P256_PRECOMPILE.to_be_bytes());
            verifiers[2..].copy_from_slice(SAFE_FCL_P256_VERIFIER.as_slice());

            let configure_signer = configureCall {
                signer: SharedSigner {
                    x: passkey.x(),
                    y: passkey.y(),
                    verifiers: U176::from_be_bytes(verifiers),
                },
            }
            .abi_encode();

            let batch = multi_send(&[
                (OPERATION_DELEGATECALL, add_modules_lib, U256::ZERO, &enable_modules[..]),
                (
                    OPERATION_DELEGATECALL,
                    SAFE_WEBAUTHN_SHARED_SIGNER,
                    U256::ZERO,
                    &configure_signer[..],
                ),
            ]);
            (SAFE_MULTI_SEND, batch)
        }
    };

    setupCall {
        owners,
        threshold: U256::from(config.threshold),
        to,
        data,
        fallbackHandler: module,
        paymentToken: Address::ZERO,
        payment: U256::ZERO,
        paymentReceiver: Address::ZERO,
    }
    .abi_encode()
    .into()
}

fn ecdsa_part(signature: &OwnerSignature) -> SignaturePart {
    match signature.scheme {
        DigestScheme::PersonalMessage => SignaturePart::Ecdsa(signature.to_eth_sign_bytes()),
        DigestScheme::Raw | DigestScheme::TypedData => SignaturePart::Ecdsa(signature.to_bytes()),
    }
}

impl SmartAccount for SafeAccount {
    fn kind(&self) -> AccountKind {
        AccountKind::Safe
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn entrypoint(&self) -> EntryPoint {
        EntryPoint::canonical(self.config.entrypoint)
    }

    fn owners(&self) -> &[AccountOwner] {
        &self.config.owners
    }

    fn address_source(&self) -> AddressSource {
        AddressSource::Create2WithFactoryCode {
            factory: SAFE_PROXY_FACTORY,
            code_call: proxyCreationCodeCall {}.abi_encode().into(),
            code_suffix: SAFE_SINGLETON_L2.into_word().to_vec().into(),
            salt: self.proxy_salt(),
        }
    }

    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError> {
        Ok(Some(FactoryData {
            factory: SAFE_PROXY_FACTORY,
            data: createProxyWithNonceCall {
                singleton: SAFE_SINGLETON_L2,
                initializer: self.initializer.clone(),
                saltNonce: self.config.salt_nonce,
            }
            .abi_encode()
            .into(),
        }))
    }

    fn encode_call(&self, call: &Call) -> Result<Bytes, EngineError> {
        Ok(executeUserOpCall {
            to: call.to,
            value: call.value,
            data: call.data.clone(),
            operation: OPERATION_CALL,
        }
        .abi_encode()
        .into())
    }

    fn encode_batch(&self, calls: &[Call]) -> Result<Bytes, EngineError> {
        let transactions: Vec<_> = calls
            .iter()
            .map(|call| (OPERATION_CALL, call.to, call.value, &call.data[..]))
            .collect();

        Ok(executeUserOpCall {
            to: SAFE_MULTI_SEND_CALL_ONLY,
            value: U256::ZERO,
            data: multi_send(&transactions),
            operation: OPERATION_DELEGATECALL,
        }
        .abi_encode()
        .into())
    }

    fn nonce_key(&self) -> U192 {
        self.config.nonce_key
    }

    fn stub_signature(&self) -> Bytes {
        let parts = self
            .signing_owners()
            .iter()
            .map(|owner| match owner {
                AccountOwner::Key(key) => (key.address(), SignaturePart::Ecdsa(DUMMY_SIGNATURE)),
                AccountOwner::Passkey(passkey) => (
                    SAFE_WEBAUTHN_SHARED_SIGNER,
                    SignaturePart::Contract(stub_safe_signature(&passkey.credential().origin)),
                ),
            })
            .collect();
        // owners were checked for duplicates on construction
        self.pack_signatures(parts).unwrap_or_default()
    }

    fn signing_digest(&self, user_op: &VersionedUserOp) -> Result<B256, EngineError> {
        self.safe_op_digest(user_op)
    }

    fn sign(&self, digest: B256) -> Result<Vec<OwnerProof>, EngineError> {
        self.signing_owners()
            .iter()
            .map(|owner| match owner {
                AccountOwner::Key(_) => raw_sign(owner, digest),
                AccountOwner::Passkey(passkey) => {
                    passkey.sign_webauthn(digest).map(OwnerProof::WebAuthn)
                }
            })
            .collect()
    }

    fn encode_signature(&self, proofs: Vec<OwnerProof>) -> Result<Bytes, EngineError> {
        if proofs.len() < self.config.threshold {
            return Err(EngineError::InvalidSignature {
                message: format!(
                    "Safe needs {} signatures, got {}",
                    self.config.threshold,
                    proofs.len()
                ),
            });
        }

        let parts = proofs
            .iter()
            .map(|proof| match proof {
                OwnerProof::Ecdsa(signature) => Ok((signature.signer, ecdsa_part(signature))),
                OwnerProof::WebAuthn(signature) => Ok((
                    SAFE_WEBAUTHN_SHARED_SIGNER,
                    SignaturePart::Contract(encode_safe_signature(signature)?),
                )),
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        self.pack_signatures(parts)
    }
}
