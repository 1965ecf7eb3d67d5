//! The contract every account strategy implements, and the handle that
//! caches what the network tells us about an account.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use aakit_aa_types::{EntryPoint, VersionedUserOp};
use aakit_core::{
    call::Call,
    chain::Chain,
    error::{AlloyRpcErrorToEngineError, EngineError},
    owner::{AccountOwner, OwnerSignature, WebAuthnSignature},
};
use alloy::primitives::{Address, B256, Bytes, U256, aliases::U192};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::account_factory::AddressSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountKind {
    Safe,
    KernelV2,
    KernelV3,
    Kernel7702,
    Nexus,
    Light,
    Simple,
    Simple7702,
    Thirdweb,
    Trust,
    Etherspot,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountKind::Safe => "safe",
            AccountKind::KernelV2 => "kernel-v2",
            AccountKind::KernelV3 => "kernel-v3",
            AccountKind::Kernel7702 => "kernel-7702",
            AccountKind::Nexus => "nexus",
            AccountKind::Light => "light",
            AccountKind::Simple => "simple",
            AccountKind::Simple7702 => "simple-7702",
            AccountKind::Thirdweb => "thirdweb",
            AccountKind::Trust => "trust",
            AccountKind::Etherspot => "etherspot",
        };
        f.write_str(name)
    }
}

/// First-time deployment step attached to a user operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryData {
    pub factory: Address,
    pub data: Bytes,
}

impl FactoryData {
    /// v0.6 `initCode`: `factory ‖ data`.
    pub fn init_code(&self) -> Bytes {
        [self.factory.as_slice(), self.data.as_ref()].concat().into()
    }
}

/// One owner's contribution to an account signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerProof {
    Ecdsa(OwnerSignature),
    WebAuthn(WebAuthnSignature),
}

impl OwnerProof {
    pub fn as_ecdsa(&self) -> Option<&OwnerSignature> {
        match self {
            OwnerProof::Ecdsa(signature) => Some(signature),
            OwnerProof::WebAuthn(_) => None,
        }
    }
}

/// A configured account strategy. Construction never touches the network and
/// nothing here awaits; chain reads go through [`AccountHandle`].
pub trait SmartAccount: Send + Sync + fmt::Debug {
    fn kind(&self) -> AccountKind;

    fn chain_id(&self) -> u64;

    fn entrypoint(&self) -> EntryPoint;

    fn owners(&self) -> &[AccountOwner];

    fn address_source(&self) -> AddressSource;

    /// `None` for accounts that are never deployed through a factory.
    fn factory_data(&self) -> Result<Option<FactoryData>, EngineError>;

    fn encode_call(&self, call: &Call) -> Result<Bytes, EngineError>;

    fn encode_batch(&self, calls: &[Call]) -> Result<Bytes, EngineError>;

    fn nonce_key(&self) -> U192 {
        U192::ZERO
    }

    /// Same byte length as the signature [`SmartAccount::sign_and_encode`] produces.
    fn stub_signature(&self) -> Bytes;

    /// The digest the on-chain validator checks.
    fn signing_digest(&self, user_op: &VersionedUserOp) -> Result<B256, EngineError> {
        Ok(user_op.hash(&self.entrypoint(), self.chain_id())?)
    }

    fn sign(&self, digest: B256) -> Result<Vec<OwnerProof>, EngineError>;

    fn encode_signature(&self, proofs: Vec<OwnerProof>) -> Result<Bytes, EngineError>;

    fn sign_and_encode(&self, digest: B256) -> Result<Bytes, EngineError> {
        let proofs = self.sign(digest)?;
        self.encode_signature(proofs)
    }

    fn is_webauthn(&self) -> bool {
        self.owners().iter().any(AccountOwner::is_passkey)
    }

    /// Lower bound for `verificationGasLimit`.
    fn verification_gas_floor(&self) -> Option<U256> {
        None
    }

    /// The EIP-7702 delegate, for accounts living at their owner's EOA.
    fn eip7702_delegate(&self) -> Option<Address> {
        None
    }

    /// Whether a real signature always has the stub's length. WebAuthn
    /// assertions vary with the authenticator.
    fn has_fixed_signature_length(&self) -> bool {
        !self.is_webauthn()
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes, EngineError> {
        match calls {
            [] => Err(EngineError::validation("At least one call is required")),
            [call] => self.encode_call(call),
            calls => self.encode_batch(calls),
        }
    }
}

/// A smart account plus its write-once address and "known deployed" memo.
#[derive(Clone)]
pub struct AccountHandle {
    account: Arc<dyn SmartAccount>,
    address: Arc<OnceCell<Address>>,
    deployed: Arc<AtomicBool>,
}

impl fmt::Debug for AccountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountHandle")
            .field("account", &self.account)
            .field("address", &self.address.get())
            .field("deployed", &self.deployed.load(Ordering::Acquire))
            .finish()
    }
}

impl AccountHandle {
    pub fn new(account: impl SmartAccount + 'static) -> Self {
        Self::from_arc(Arc::new(account))
    }

    pub fn from_arc(account: Arc<dyn SmartAccount>) -> Self {
        Self {
            account,
            address: Arc::new(OnceCell::new()),
            deployed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn account(&self) -> &dyn SmartAccount {
        self.account.as_ref()
    }

    /// Resolve once; concurrent callers wait for the first resolution. A
    /// failed resolution is not cached.
    pub async fn resolve_address<C: Chain>(&self, chain: &C) -> Result<Address, EngineError> {
        self.address
            .get_or_try_init(|| async {
                let address = self.account.address_source().resolve(chain).await?;
                tracing::debug!(
                    kind = %self.account.kind(),
                    address = ?address,
                    "Resolved smart account address"
                );
                Ok::<_, EngineError>(address)
            })
            .await
            .copied()
    }

    pub fn cached_address(&self) -> Option<Address> {
        self.address.get().copied()
    }

    /// Once code has been observed it is never queried again.
    pub async fn is_deployed<C: Chain>(&self, chain: &C) -> Result<bool, EngineError> {
        if self.deployed.load(Ordering::Acquire) {
            return Ok(true);
        }

        let address = self.resolve_address(chain).await?;
        let deployed = chain
            .public_client()
            .is_contract(address)
            .await
            .map_err(|e| e.to_engine_error(chain))?;

        if deployed {
            self.mark_deployed();
        }
        Ok(deployed)
    }

    pub fn mark_deployed(&self) {
        self.deployed.store(true, Ordering::Release);
    }

    /// Factory data for the next user operation, or `None` when the account
    /// needs no deployment.
    pub async fn deployment_data<C: Chain>(
        &self,
        chain: &C,
    ) -> Result<Option<FactoryData>, EngineError> {
        let Some(factory_data) = self.account.factory_data()? else {
            return Ok(None);
        };
        if self.is_deployed(chain).await? {
            return Ok(None);
        }
        Ok(Some(factory_data))
    }
}
