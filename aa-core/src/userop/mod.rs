//! Building, signing and tracking user operations.

pub mod builder;
pub mod poll;

use std::fmt;

pub use builder::{
    GasProfile, PrepareOptions, PreparedUserOp, SignedUserOp, Sponsorship, UserOpBuilder,
    UserOpBuilderConfig, sign_prepared,
};
pub use poll::{Backoff, PollOutcome, PollPolicy, poll_user_op};

/// Where a user operation is in its lifecycle. Recorded on tracing spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOpStage {
    Building,
    EstimatingGas,
    Signing,
    Submitted,
    Polling,
    Success,
    Failed,
    TimedOut,
    Cancelled,
}

impl UserOpStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UserOpStage::Success
                | UserOpStage::Failed
                | UserOpStage::TimedOut
                | UserOpStage::Cancelled
        )
    }
}

impl fmt::Display for UserOpStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserOpStage::Building => "building",
            UserOpStage::EstimatingGas => "estimating_gas",
            UserOpStage::Signing => "signing",
            UserOpStage::Submitted => "submitted",
            UserOpStage::Polling => "polling",
            UserOpStage::Success => "success",
            UserOpStage::Failed => "failed",
            UserOpStage::TimedOut => "timed_out",
            UserOpStage::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
