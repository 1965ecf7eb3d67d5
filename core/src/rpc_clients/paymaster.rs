use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{PackedUserOperation, UserOperation};
use alloy::transports::{IntoBoxTransport, TransportResult};
use serde::{Deserialize, Serialize};

/// Paymaster result for v0.6
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterResultV06 {
    pub pre_verification_gas: Option<U256>,
    pub verification_gas_limit: Option<U256>,
    pub call_gas_limit: Option<U256>,
    pub paymaster_and_data: Bytes,
}

/// Paymaster result for v0.7 and later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterResultV07 {
    pub pre_verification_gas: Option<U256>,
    pub verification_gas_limit: Option<U256>,
    pub call_gas_limit: Option<U256>,
    pub paymaster: Address,
    pub paymaster_data: Bytes,
    pub paymaster_verification_gas_limit: Option<U256>,
    pub paymaster_post_op_gas_limit: Option<U256>,
}

/// The gas limits a paymaster returned, when it returned all three.
pub trait SponsoredGas {
    fn gas_limits(&self) -> Option<(U256, U256, U256)>;
}

impl SponsoredGas for PaymasterResultV06 {
    fn gas_limits(&self) -> Option<(U256, U256, U256)> {
        Some((
            self.verification_gas_limit?,
            self.call_gas_limit?,
            self.pre_verification_gas?,
        ))
    }
}

impl SponsoredGas for PaymasterResultV07 {
    fn gas_limits(&self) -> Option<(U256, U256, U256)> {
        Some((
            self.verification_gas_limit?,
            self.call_gas_limit?,
            self.pre_verification_gas?,
        ))
    }
}

/// A JSON-RPC client for an ERC-4337 paymaster
#[derive(Debug, Clone)]
pub struct PaymasterClient {
    pub inner: RpcClient,
}

impl PaymasterClient {
    pub fn new(transport: impl IntoBoxTransport) -> Self {
        let client = RpcClient::builder().transport(transport, false);
        Self { inner: client }
    }

    /// `pm_sponsorUserOperation` for a v0.6 operation. `context` is passed
    /// through verbatim (sponsorship policy ids and similar).
    pub async fn sponsor_user_op_v0_6(
        &self,
        userop: &UserOperation,
        entrypoint: Address,
        context: Option<&serde_json::Value>,
    ) -> TransportResult<PaymasterResultV06> {
        match context {
            Some(context) => {
                self.inner
                    .request("pm_sponsorUserOperation", (userop, entrypoint, context))
                    .await
            }
            None => {
                self.inner
                    .request("pm_sponsorUserOperation", (userop, entrypoint))
                    .await
            }
        }
    }

    /// `pm_sponsorUserOperation` for a packed operation.
    pub async fn sponsor_user_op_v0_7(
        &self,
        userop: &PackedUserOperation,
        entrypoint: Address,
        context: Option<&serde_json::Value>,
    ) -> TransportResult<PaymasterResultV07> {
        match context {
            Some(context) => {
                self.inner
                    .request("pm_sponsorUserOperation", (userop, entrypoint, context))
                    .await
            }
            None => {
                self.inner
                    .request("pm_sponsorUserOperation", (userop, entrypoint))
                    .await
            }
        }
    }
}
