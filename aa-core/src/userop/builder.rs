use aakit_aa_types::{EntryPoint, EntryPointVersion, VersionedUserOp};
use aakit_core::{
    call::Call,
    chain::Chain,
    config::GasConfig,
    error::{AlloyRpcErrorToEngineError, ContractErrorToEngineError, EngineError},
    owner::AccountOwner,
    rpc_clients::{FeeSuggestion, SponsoredGas},
};
use aakit_eip7702_core::DelegatedAccount;
use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{Address, B256, Bytes, U256},
    providers::Provider,
    rpc::types::{PackedUserOperation, UserOperation},
};

use super::UserOpStage;
use crate::smart_account::{AccountHandle, FactoryData, SmartAccount};

/// Multipliers applied to bundler gas estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GasProfile {
    /// Estimates as returned.
    #[default]
    Standard,
    /// Verification and call gas raised by half.
    Conservative,
    Custom(GasConfig),
}

impl GasProfile {
    pub fn percents(&self) -> GasConfig {
        match self {
            GasProfile::Standard => GasConfig::default(),
            GasProfile::Conservative => GasConfig {
                pre_verification_gas_percent: 100,
                verification_gas_percent: 150,
                call_gas_percent: 150,
            },
            GasProfile::Custom(config) => *config,
        }
    }

    /// Scale `(verification, call, preVerification)`.
    pub fn apply(
        &self,
        verification: U256,
        call: U256,
        pre_verification: U256,
    ) -> (U256, U256, U256) {
        let percents = self.percents();
        (
            scale(verification, percents.verification_gas_percent),
            scale(call, percents.call_gas_percent),
            scale(pre_verification, percents.pre_verification_gas_percent),
        )
    }
}

impl From<GasConfig> for GasProfile {
    fn from(config: GasConfig) -> Self {
        if config == GasConfig::default() {
            GasProfile::Standard
        } else {
            GasProfile::Custom(config)
        }
    }
}

fn scale(value: U256, percent: u32) -> U256 {
    value.saturating_mul(U256::from(percent)) / U256::from(100)
}

/// Ask the chain's paymaster to pay for the operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sponsorship {
    /// Passed to `pm_sponsorUserOperation` verbatim, e.g. a sponsorship policy id.
    pub context: Option<serde_json::Value>,
}

/// Caller overrides for values otherwise read from the network.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    pub nonce: Option<U256>,
    pub fees: Option<FeeSuggestion>,
}

/// An estimated, stub-signed operation ready for signing.
#[derive(Debug, Clone)]
pub struct PreparedUserOp {
    pub user_op: VersionedUserOp,
    pub entrypoint: EntryPoint,
    pub sender: Address,
    /// Rides next to the operation when the EOA is not yet delegated.
    pub authorization: Option<SignedAuthorization>,
}

#[derive(Debug, Clone)]
pub struct SignedUserOp {
    pub user_op: VersionedUserOp,
    pub entrypoint: EntryPoint,
    pub authorization: Option<SignedAuthorization>,
    /// The hash the EntryPoint will assign.
    pub user_op_hash: B256,
}

pub struct UserOpBuilderConfig<'a, C: Chain> {
    pub account: &'a AccountHandle,
    pub chain: &'a C,
    pub calls: &'a [Call],
    pub gas_profile: GasProfile,
    pub sponsorship: Option<&'a Sponsorship>,
    pub options: PrepareOptions,
}

pub struct UserOpBuilder<'a, C: Chain> {
    config: UserOpBuilderConfig<'a, C>,
}

impl<'a, C: Chain> UserOpBuilder<'a, C> {
    pub fn new(config: UserOpBuilderConfig<'a, C>) -> Self {
        Self { config }
    }

    #[tracing::instrument(
        skip_all,
        fields(
            kind = %self.config.account.account().kind(),
            chain_id = self.config.chain.chain_id(),
            stage = %UserOpStage::Building
        )
    )]
    pub async fn build(self) -> Result<PreparedUserOp, EngineError> {
        let UserOpBuilderConfig {
            account: handle,
            chain,
            calls,
            gas_profile,
            sponsorship,
            options,
        } = self.config;
        let account = handle.account();
        let entrypoint = account.entrypoint();

        let call_data = account.encode_calls(calls)?;
        let sender = handle.resolve_address(chain).await?;

        let nonce = match options.nonce {
            Some(nonce) => nonce,
            None => chain
                .public_client()
                .get_entrypoint_nonce(entrypoint.address, sender, account.nonce_key())
                .await
                .map_err(|e| e.to_engine_error(chain.chain_id(), Some(entrypoint.address)))?,
        };

        let deployment = handle.deployment_data(chain).await?;
        let authorization = delegation_authorization(account, sender, chain).await?;

        tracing::debug!(
            sender = ?sender,
            nonce = %nonce,
            deploying = deployment.is_some(),
            delegating = authorization.is_some(),
            "UserOp shell built"
        );

        let mut user_op = user_op_shell(
            entrypoint.version,
            sender,
            nonce,
            call_data,
            deployment,
            account.stub_signature(),
        );

        let fees = match options.fees {
            Some(fees) => fees,
            None => suggested_fees(chain).await?,
        };
        user_op.set_fees(fees.max_fee_per_gas, fees.max_priority_fee_per_gas);

        tracing::debug!(
            max_fee_per_gas = %fees.max_fee_per_gas,
            max_priority_fee_per_gas = %fees.max_priority_fee_per_gas,
            "Gas prices determined"
        );

        let sponsored_limits = match sponsorship {
            Some(sponsorship) => sponsor(chain, &mut user_op, entrypoint, sponsorship).await?,
            None => None,
        };

        tracing::Span::current()
            .record("stage", tracing::field::display(UserOpStage::EstimatingGas));

        // paymaster signatures commit to the gas limits, so they are used as returned
        let (verification, call, pre_verification) = match sponsored_limits {
            Some(limits) => {
                tracing::debug!("Using paymaster-provided gas limits");
                limits
            }
            None => {
                let estimate = chain
                    .bundler_client()
                    .estimate_user_op_gas(
                        &user_op,
                        entrypoint.address,
                        authorization.as_ref(),
                        None,
                    )
                    .await
                    .map_err(|e| e.to_engine_bundler_error(chain))?;

                if let VersionedUserOp::V0_7(op) = &mut user_op {
                    if op.paymaster.is_some() {
                        op.paymaster_verification_gas_limit = estimate
                            .paymaster_verification_gas_limit
                            .or(op.paymaster_verification_gas_limit);
                        op.paymaster_post_op_gas_limit = Some(
                            estimate
                                .paymaster_post_op_gas_limit
                                .or(op.paymaster_post_op_gas_limit)
                                .unwrap_or_default(),
                        );
                    }
                }

                let (verification, call, pre_verification) = gas_profile.apply(
                    estimate.verification_gas_limit,
                    estimate.call_gas_limit,
                    estimate.pre_verification_gas,
                );
                let verification = match account.verification_gas_floor() {
                    Some(floor) => verification.max(floor),
                    None => verification,
                };
                (verification, call, pre_verification)
            }
        };
        user_op.set_gas_limits(verification, call, pre_verification);

        tracing::debug!(
            verification_gas_limit = %verification,
            call_gas_limit = %call,
            pre_verification_gas = %pre_verification,
            "Gas limits determined"
        );

        Ok(PreparedUserOp {
            user_op,
            entrypoint,
            sender,
            authorization,
        })
    }
}

fn user_op_shell(
    version: EntryPointVersion,
    sender: Address,
    nonce: U256,
    call_data: Bytes,
    deployment: Option<FactoryData>,
    stub_signature: Bytes,
) -> VersionedUserOp {
    match version {
        EntryPointVersion::V0_6 => VersionedUserOp::V0_6(UserOperation {
            sender,
            nonce,
            init_code: deployment
                .as_ref()
                .map(FactoryData::init_code)
                .unwrap_or_default(),
            call_data,
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster_and_data: Bytes::default(),
            signature: stub_signature,
        }),
        EntryPointVersion::V0_7 | EntryPointVersion::V0_8 => {
            let (factory, factory_data) = match deployment {
                Some(deployment) => (Some(deployment.factory), Some(deployment.data)),
                None => (None, None),
            };
            VersionedUserOp::V0_7(PackedUserOperation {
                sender,
                nonce,
                factory,
                factory_data,
                call_data,
                call_gas_limit: U256::ZERO,
                verification_gas_limit: U256::ZERO,
                pre_verification_gas: U256::ZERO,
                max_fee_per_gas: U256::ZERO,
                max_priority_fee_per_gas: U256::ZERO,
                paymaster: None,
                paymaster_data: None,
                paymaster_verification_gas_limit: None,
                paymaster_post_op_gas_limit: None,
                signature: stub_signature,
            })
        }
    }
}

/// An EIP-7702 authorization when the account lives at an EOA that carries no
/// delegation yet.
async fn delegation_authorization<C: Chain>(
    account: &dyn SmartAccount,
    sender: Address,
    chain: &C,
) -> Result<Option<SignedAuthorization>, EngineError> {
    let Some(delegate) = account.eip7702_delegate() else {
        return Ok(None);
    };
    let owner = account
        .owners()
        .first()
        .and_then(AccountOwner::as_key)
        .ok_or_else(|| EngineError::validation("EIP-7702 accounts need a key owner"))?;

    DelegatedAccount::new(sender, chain)
        .authorization_if_needed(owner, delegate)
        .await
}

/// The bundler's vendor price when it has one, else the node's EIP-1559 estimate.
async fn suggested_fees<C: Chain>(chain: &C) -> Result<FeeSuggestion, EngineError> {
    let vendor = chain
        .bundler_client()
        .get_user_op_gas_price()
        .await
        .map_err(|e| e.to_engine_bundler_error(chain))?;
    if let Some(suggestion) = vendor {
        return Ok(suggestion.standard());
    }

    let estimate = chain
        .provider()
        .estimate_eip1559_fees()
        .await
        .map_err(|e| e.to_engine_error(chain))?;
    Ok(FeeSuggestion {
        max_fee_per_gas: U256::from(estimate.max_fee_per_gas),
        max_priority_fee_per_gas: U256::from(estimate.max_priority_fee_per_gas),
    })
}

/// Apply paymaster data; returns the paymaster's gas limits when it supplied
/// every limit the operation needs.
async fn sponsor<C: Chain>(
    chain: &C,
    user_op: &mut VersionedUserOp,
    entrypoint: EntryPoint,
    sponsorship: &Sponsorship,
) -> Result<Option<(U256, U256, U256)>, EngineError> {
    let paymaster = chain
        .paymaster_client()
        .ok_or_else(|| EngineError::RpcConfigError {
            message: format!(
                "Sponsorship requested but chain {} has no paymaster configured",
                chain.chain_id()
            ),
        })?;
    let context = sponsorship.context.as_ref();

    match user_op {
        VersionedUserOp::V0_6(op) => {
            let result = paymaster
                .sponsor_user_op_v0_6(op, entrypoint.address, context)
                .await
                .map_err(|e| e.to_engine_paymaster_error(chain))?;
            tracing::debug!("v6 UserOp paymaster and data determined");

            op.paymaster_and_data = result.paymaster_and_data.clone();
            Ok(result.gas_limits())
        }
        VersionedUserOp::V0_7(op) => {
            let result = paymaster
                .sponsor_user_op_v0_7(op, entrypoint.address, context)
                .await
                .map_err(|e| e.to_engine_paymaster_error(chain))?;
            tracing::debug!("v7 UserOp paymaster and data determined");

            op.paymaster = Some(result.paymaster);
            op.paymaster_data = Some(result.paymaster_data.clone());
            op.paymaster_verification_gas_limit = result.paymaster_verification_gas_limit;
            op.paymaster_post_op_gas_limit = result.paymaster_post_op_gas_limit;

            let paymaster_limits_complete = result.paymaster_verification_gas_limit.is_some()
                && result.paymaster_post_op_gas_limit.is_some();
            Ok(result.gas_limits().filter(|_| paymaster_limits_complete))
        }
    }
}

/// Sign a prepared operation, checking the signature has the shape the
/// estimate was made with.
pub fn sign_prepared(
    account: &dyn SmartAccount,
    prepared: PreparedUserOp,
) -> Result<SignedUserOp, EngineError> {
    let PreparedUserOp {
        mut user_op,
        entrypoint,
        authorization,
        ..
    } = prepared;

    let digest = account.signing_digest(&user_op)?;
    let signature = account.sign_and_encode(digest)?;

    if signature.is_empty() {
        return Err(EngineError::InvalidSignature {
            message: "Account produced an empty signature".to_string(),
        });
    }
    if account.has_fixed_signature_length() {
        let expected = account.stub_signature().len();
        if signature.len() != expected {
            return Err(EngineError::InvalidSignature {
                message: format!(
                    "Signature is {} bytes but gas was estimated for {expected}",
                    signature.len()
                ),
            });
        }
    }

    user_op.set_signature(signature);
    let user_op_hash = user_op.hash(&entrypoint, account.chain_id())?;

    tracing::debug!(
        kind = %account.kind(),
        user_op_hash = ?user_op_hash,
        stage = %UserOpStage::Signing,
        "UserOp signed"
    );

    Ok(SignedUserOp {
        user_op,
        entrypoint,
        authorization,
        user_op_hash,
    })
}
