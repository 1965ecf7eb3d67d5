//! Waiting for a submitted user operation to land.
//!
//! The loop is a small state machine: each step asks the bundler for a
//! receipt, folds the answer into [`Poller`] and either finishes with a
//! [`PollOutcome`] or sleeps for the next backoff interval. Timing out and
//! cancellation are outcomes, not errors, and neither touches the submitted
//! operation.

use std::time::Duration;

use aakit_core::{
    chain::Chain,
    config::PollingConfig,
    error::{AlloyRpcErrorToEngineError, EngineError},
    rpc_clients::{UserOpStatusKind, UserOperationReceipt},
};
use alloy::primitives::B256;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::UserOpStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `initial * multiplier^attempt`, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: u32,
    },
}

impl Backoff {
    /// Delay after the `attempt`-th unsuccessful poll, counting from zero.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(interval) => interval,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => initial
                .saturating_mul(multiplier.saturating_pow(attempt))
                .min(max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub backoff: Backoff,
    pub timeout: Duration,
    /// Consecutive transient transport failures tolerated.
    pub max_transient_retries: u32,
}

impl From<PollingConfig> for PollPolicy {
    fn from(config: PollingConfig) -> Self {
        let initial = Duration::from_millis(config.interval_ms);
        let max = Duration::from_millis(config.max_interval_ms);
        let backoff = if max <= initial {
            Backoff::Fixed(initial)
        } else {
            Backoff::Exponential {
                initial,
                max,
                multiplier: 2,
            }
        };

        Self {
            backoff,
            timeout: Duration::from_millis(config.timeout_ms),
            max_transient_retries: config.max_transient_retries,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollingConfig::default().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Success(UserOperationReceipt),
    /// Reverted on chain (with a receipt) or dropped by the bundler (without).
    Failed {
        receipt: Option<UserOperationReceipt>,
        reason: Option<String>,
    },
    /// The operation may still land; callers can poll again later.
    TimedOut {
        user_op_hash: B256,
        last_status: Option<UserOpStatusKind>,
    },
    Cancelled { user_op_hash: B256 },
}

impl PollOutcome {
    pub fn stage(&self) -> UserOpStage {
        match self {
            PollOutcome::Success(_) => UserOpStage::Success,
            PollOutcome::Failed { .. } => UserOpStage::Failed,
            PollOutcome::TimedOut { .. } => UserOpStage::TimedOut,
            PollOutcome::Cancelled { .. } => UserOpStage::Cancelled,
        }
    }

    pub fn receipt(&self) -> Option<&UserOperationReceipt> {
        match self {
            PollOutcome::Success(receipt) => Some(receipt),
            PollOutcome::Failed { receipt, .. } => receipt.as_ref(),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Success(_))
    }
}

enum Step {
    Done(PollOutcome),
    Wait(Duration),
}

struct Poller<'a, C: Chain> {
    chain: &'a C,
    user_op_hash: B256,
    policy: &'a PollPolicy,
    deadline: Instant,
    attempt: u32,
    transient_failures: u32,
    last_status: Option<UserOpStatusKind>,
}

impl<'a, C: Chain> Poller<'a, C> {
    fn new(chain: &'a C, user_op_hash: B256, policy: &'a PollPolicy) -> Self {
        Self {
            chain,
            user_op_hash,
            policy,
            deadline: Instant::now() + policy.timeout,
            attempt: 0,
            transient_failures: 0,
            last_status: None,
        }
    }

    async fn step(&mut self) -> Result<Step, EngineError> {
        let receipt = self
            .chain
            .bundler_client()
            .get_user_op_receipt(self.user_op_hash)
            .await;

        match receipt {
            Ok(Some(receipt)) => {
                let outcome = if receipt.success {
                    PollOutcome::Success(receipt)
                } else {
                    let reason = receipt.reason.clone();
                    PollOutcome::Failed {
                        receipt: Some(receipt),
                        reason,
                    }
                };
                return Ok(Step::Done(outcome));
            }
            Ok(None) => {
                self.transient_failures = 0;
                if let Some(outcome) = self.check_vendor_status().await {
                    return Ok(Step::Done(outcome));
                }
            }
            Err(e) => {
                let error = e.to_engine_bundler_error(self.chain);
                if !error.is_transient()
                    || self.transient_failures >= self.policy.max_transient_retries
                {
                    return Err(error);
                }
                self.transient_failures += 1;
                tracing::warn!(
                    user_op_hash = ?self.user_op_hash,
                    retry = self.transient_failures,
                    error = %error,
                    "Transient failure while polling for receipt"
                );
            }
        }

        let now = Instant::now();
        if now >= self.deadline {
            return Ok(Step::Done(PollOutcome::TimedOut {
                user_op_hash: self.user_op_hash,
                last_status: self.last_status,
            }));
        }

        let delay = self.policy.backoff.delay(self.attempt).min(self.deadline - now);
        self.attempt = self.attempt.saturating_add(1);
        Ok(Step::Wait(delay))
    }

    /// A vendor-reported failure for an operation that has no receipt.
    async fn check_vendor_status(&mut self) -> Option<PollOutcome> {
        match self.chain.bundler_client().get_user_op_status(self.user_op_hash).await {
            Ok(Some(status)) => {
                self.last_status = Some(status.status);
                status.status.is_failure().then(|| PollOutcome::Failed {
                    receipt: None,
                    reason: status
                        .reason
                        .or_else(|| Some(format!("bundler reported {:?}", status.status))),
                })
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(
                    user_op_hash = ?self.user_op_hash,
                    error = %e,
                    "Vendor status lookup failed"
                );
                None
            }
        }
    }
}

/// Poll until the operation has a receipt, the bundler reports it failed,
/// the policy's timeout passes or `cancel` fires.
#[tracing::instrument(
    skip_all,
    fields(
        user_op_hash = ?user_op_hash,
        chain_id = chain.chain_id(),
        stage = %UserOpStage::Polling
    )
)]
pub async fn poll_user_op<C: Chain>(
    chain: &C,
    user_op_hash: B256,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<PollOutcome, EngineError> {
    let mut poller = Poller::new(chain, user_op_hash, policy);

    loop {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled { user_op_hash });
        }

        match poller.step().await? {
            Step::Done(outcome) => {
                tracing::debug!(stage = %outcome.stage(), "Polling finished");
                return Ok(outcome);
            }
            Step::Wait(delay) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Ok(PollOutcome::Cancelled { user_op_hash });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
