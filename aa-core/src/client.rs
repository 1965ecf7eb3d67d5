use aakit_aa_types::status::{
    CallReceipt, CallsStatus, STATUS_CONFIRMED, STATUS_OFFCHAIN_FAILURE, STATUS_REVERTED,
};
use aakit_core::{
    call::Call,
    chain::Chain,
    config::EngineConfig,
    error::{AlloyRpcErrorToEngineError, EngineError},
};
use alloy::primitives::{Address, B256};
use tokio_util::sync::CancellationToken;

use crate::{
    smart_account::AccountHandle,
    userop::{
        GasProfile, PollOutcome, PollPolicy, PrepareOptions, PreparedUserOp, SignedUserOp,
        Sponsorship, UserOpBuilder, UserOpBuilderConfig, UserOpStage, poll_user_op,
        sign_prepared,
    },
};

/// Drives one smart account through prepare, sign, send and wait on one chain.
///
/// Methods take `&self` and may run concurrently. Nonces are read from the
/// EntryPoint for every preparation, so concurrent sends from the same nonce
/// key must be sequenced by the caller, e.g. with [`PrepareOptions::nonce`].
#[derive(Debug, Clone)]
pub struct SmartAccountClient<C: Chain> {
    chain: C,
    account: AccountHandle,
    gas_profile: GasProfile,
    poll_policy: PollPolicy,
    sponsorship: Option<Sponsorship>,
}

impl<C: Chain> SmartAccountClient<C> {
    pub fn new(chain: C, account: AccountHandle) -> Result<Self, EngineError> {
        let account_chain_id = account.account().chain_id();
        if account_chain_id != chain.chain_id() {
            return Err(EngineError::validation(format!(
                "Account is configured for chain {account_chain_id} but the client targets chain {}",
                chain.chain_id()
            )));
        }

        Ok(Self {
            chain,
            account,
            gas_profile: GasProfile::default(),
            poll_policy: PollPolicy::default(),
            sponsorship: None,
        })
    }

    /// Gas multipliers and polling behaviour from the engine configuration.
    pub fn from_config(
        chain: C,
        account: AccountHandle,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        Ok(Self::new(chain, account)?
            .with_gas_profile(config.gas.into())
            .with_poll_policy(config.polling.into()))
    }

    pub fn with_gas_profile(mut self, gas_profile: GasProfile) -> Self {
        self.gas_profile = gas_profile;
        self
    }

    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }

    /// Sponsor every operation through the chain's paymaster.
    pub fn with_sponsorship(mut self, sponsorship: Sponsorship) -> Self {
        self.sponsorship = Some(sponsorship);
        self
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn account(&self) -> &AccountHandle {
        &self.account
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    pub async fn address(&self) -> Result<Address, EngineError> {
        self.account.resolve_address(&self.chain).await
    }

    pub async fn is_deployed(&self) -> Result<bool, EngineError> {
        self.account.is_deployed(&self.chain).await
    }

    /// Build and estimate an operation executing `calls`, signed with the
    /// account's stub signature.
    pub async fn prepare(
        &self,
        calls: &[Call],
        options: PrepareOptions,
    ) -> Result<PreparedUserOp, EngineError> {
        UserOpBuilder::new(UserOpBuilderConfig {
            account: &self.account,
            chain: &self.chain,
            calls,
            gas_profile: self.gas_profile,
            sponsorship: self.sponsorship.as_ref(),
            options,
        })
        .build()
        .await
    }

    pub fn sign(&self, prepared: PreparedUserOp) -> Result<SignedUserOp, EngineError> {
        sign_prepared(self.account.account(), prepared)
    }

    /// Submit to the bundler and return the hash it reports.
    #[tracing::instrument(
        skip_all,
        fields(
            user_op_hash = ?signed.user_op_hash,
            chain_id = self.chain.chain_id(),
            stage = %UserOpStage::Submitted
        )
    )]
    pub async fn send(&self, signed: &SignedUserOp) -> Result<B256, EngineError> {
        let user_op_hash = self
            .chain
            .bundler_client()
            .send_user_op(
                &signed.user_op,
                signed.entrypoint.address,
                signed.authorization.as_ref(),
            )
            .await
            .map_err(|e| e.to_engine_bundler_error(&self.chain))?;

        if user_op_hash != signed.user_op_hash {
            tracing::warn!(
                bundler_hash = ?user_op_hash,
                "Bundler returned a different userOp hash than computed locally"
            );
        }

        tracing::info!(
            sender = ?signed.user_op.sender(),
            with_authorization = signed.authorization.is_some(),
            "UserOp submitted"
        );
        Ok(user_op_hash)
    }

    /// Poll with the client's policy. A receipt of any kind proves the
    /// account is deployed.
    pub async fn wait(
        &self,
        user_op_hash: B256,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, EngineError> {
        let outcome = poll_user_op(&self.chain, user_op_hash, &self.poll_policy, cancel).await?;

        if outcome.receipt().is_some() {
            self.account.mark_deployed();
        }
        match &outcome {
            PollOutcome::Success(receipt) => tracing::info!(
                user_op_hash = ?user_op_hash,
                transaction_hash = ?receipt.receipt.transaction_hash,
                "UserOp confirmed"
            ),
            PollOutcome::Failed { reason, .. } => tracing::info!(
                user_op_hash = ?user_op_hash,
                reason = reason.as_deref().unwrap_or("unknown"),
                "UserOp failed"
            ),
            _ => {}
        }
        Ok(outcome)
    }

    pub async fn send_calls(&self, calls: &[Call]) -> Result<B256, EngineError> {
        let prepared = self.prepare(calls, PrepareOptions::default()).await?;
        let signed = self.sign(prepared)?;
        self.send(&signed).await
    }

    pub async fn send_calls_and_wait(
        &self,
        calls: &[Call],
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, EngineError> {
        let user_op_hash = self.send_calls(calls).await?;
        self.wait(user_op_hash, cancel).await
    }

    /// ERC-5792 view of a submitted operation.
    pub async fn get_calls_status(&self, user_op_hash: B256) -> Result<CallsStatus, EngineError> {
        let bundler = self.chain.bundler_client();
        let mut status = CallsStatus::pending(user_op_hash.to_string(), self.chain.chain_id());

        let receipt = bundler
            .get_user_op_receipt(user_op_hash)
            .await
            .map_err(|e| e.to_engine_bundler_error(&self.chain))?;

        if let Some(receipt) = receipt {
            status.status = if receipt.success {
                STATUS_CONFIRMED
            } else {
                STATUS_REVERTED
            };
            status.receipts = Some(vec![CallReceipt {
                status: u64::from(receipt.success),
                logs: receipt.logs,
                block_hash: receipt.receipt.block_hash,
                block_number: receipt.receipt.block_number,
                gas_used: receipt.receipt.gas_used,
                transaction_hash: receipt.receipt.transaction_hash,
            }]);
            return Ok(status);
        }

        match bundler.get_user_op_status(user_op_hash).await {
            Ok(Some(vendor)) if vendor.status.is_failure() => {
                status.status = STATUS_OFFCHAIN_FAILURE;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "Vendor status lookup failed"),
        }
        Ok(status)
    }
}
