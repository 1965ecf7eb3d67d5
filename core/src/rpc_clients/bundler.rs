use aakit_aa_types::{VersionedUserOp, status::CallLog};
use alloy::eips::eip7702::SignedAuthorization;
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::client::RpcClient;
use alloy::transports::{IntoBoxTransport, TransportResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Names of non-standard bundler methods. Vendors disagree on these, so they
/// are configured per chain; `None` disables the capability.
///
/// [`Default`] is the Pimlico pair and only applies when a chain has no
/// `bundlerMethods` at all. A field left out of an explicit block is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerMethods {
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Default for BundlerMethods {
    fn default() -> Self {
        Self {
            gas_price: Some("pimlico_getUserOperationGasPrice".to_string()),
            status: Some("pimlico_getUserOperationStatus".to_string()),
        }
    }
}

impl BundlerMethods {
    pub fn standard_only() -> Self {
        Self {
            gas_price: None,
            status: None,
        }
    }
}

/// A JSON-RPC client for interacting with an ERC-4337 bundler
#[derive(Debug, Clone)]
pub struct BundlerClient {
    inner: RpcClient,
    methods: BundlerMethods,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UseropGasEstimation {
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    #[serde(default, alias = "paymasterVerificationGas")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, alias = "paymasterPostOpGas")]
    pub paymaster_post_op_gas_limit: Option<U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSuggestion {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Gas price suggestion. Tiered vendors return slow/standard/fast, others a single pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GasPriceSuggestion {
    Tiered {
        slow: FeeSuggestion,
        standard: FeeSuggestion,
        fast: FeeSuggestion,
    },
    Flat(FeeSuggestion),
}

impl GasPriceSuggestion {
    pub fn standard(&self) -> FeeSuggestion {
        match self {
            GasPriceSuggestion::Tiered { standard, .. } => *standard,
            GasPriceSuggestion::Flat(fees) => *fees,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOpStatusKind {
    NotFound,
    NotSubmitted,
    Queued,
    Submitted,
    Pending,
    Included,
    Success,
    Rejected,
    Reverted,
    Failed,
    #[serde(other)]
    Unknown,
}

impl UserOpStatusKind {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            UserOpStatusKind::Rejected | UserOpStatusKind::Reverted | UserOpStatusKind::Failed
        )
    }
}

/// Vendor status, richer than the receipt while the operation is still in flight.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOpStatus {
    pub status: UserOpStatusKind,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundledTransactionReceipt {
    pub transaction_hash: B256,
    pub block_hash: B256,
    #[serde(with = "alloy::serde::quantity")]
    pub block_number: u64,
    #[serde(with = "alloy::serde::quantity")]
    pub gas_used: u64,
}

/// `eth_getUserOperationReceipt` result. Only the fields this crate reads are
/// required, so bundlers that omit parts of the transaction receipt still parse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: B256,
    pub entry_point: Address,
    pub sender: Address,
    pub nonce: U256,
    #[serde(default)]
    pub paymaster: Option<Address>,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub logs: Vec<CallLog>,
    pub receipt: BundledTransactionReceipt,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationByHash {
    pub user_operation: serde_json::Value,
    pub entry_point: Address,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub block_hash: Option<B256>,
}

/// A user operation with an optional EIP-7702 authorization riding alongside it.
/// The authorization is part of the request, not of the hashed operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOpRequest<'a> {
    #[serde(flatten)]
    pub user_op: &'a VersionedUserOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eip7702_auth: Option<&'a SignedAuthorization>,
}

impl BundlerClient {
    /// Create a new bundler client with the given transport
    pub fn new(transport: impl IntoBoxTransport) -> Self {
        Self::from_rpc_client(RpcClient::builder().transport(transport, false))
    }

    pub fn from_rpc_client(inner: RpcClient) -> Self {
        Self {
            inner,
            methods: BundlerMethods::default(),
        }
    }

    pub fn with_methods(mut self, methods: BundlerMethods) -> Self {
        self.methods = methods;
        self
    }

    pub fn methods(&self) -> &BundlerMethods {
        &self.methods
    }

    /// Get a user operation receipt by hash
    pub async fn get_user_op_receipt(
        &self,
        user_op_hash: B256,
    ) -> TransportResult<Option<UserOperationReceipt>> {
        self.inner
            .request("eth_getUserOperationReceipt", [user_op_hash])
            .await
    }

    pub async fn get_user_op_by_hash(
        &self,
        user_op_hash: B256,
    ) -> TransportResult<Option<UserOperationByHash>> {
        self.inner
            .request("eth_getUserOperationByHash", [user_op_hash])
            .await
    }

    /// Estimate the gas for a user operation
    pub async fn estimate_user_op_gas(
        &self,
        user_op: &VersionedUserOp,
        entrypoint: Address,
        authorization: Option<&SignedAuthorization>,
        state_overrides: Option<HashMap<String, HashMap<String, String>>>,
    ) -> TransportResult<UseropGasEstimation> {
        let request = UserOpRequest {
            user_op,
            eip7702_auth: authorization,
        };

        match state_overrides {
            Some(overrides) => {
                self.inner
                    .request(
                        "eth_estimateUserOperationGas",
                        (request, entrypoint, overrides),
                    )
                    .await
            }
            None => {
                self.inner
                    .request("eth_estimateUserOperationGas", (request, entrypoint))
                    .await
            }
        }
    }

    pub async fn send_user_op(
        &self,
        user_op: &VersionedUserOp,
        entrypoint: Address,
        authorization: Option<&SignedAuthorization>,
    ) -> TransportResult<B256> {
        let request = UserOpRequest {
            user_op,
            eip7702_auth: authorization,
        };

        self.inner
            .request("eth_sendUserOperation", (request, entrypoint))
            .await
    }

    pub async fn supported_entry_points(&self) -> TransportResult<Vec<Address>> {
        self.inner.request_noparams("eth_supportedEntryPoints").await
    }

    /// Vendor gas price suggestion; `None` when no method is configured.
    pub async fn get_user_op_gas_price(&self) -> TransportResult<Option<GasPriceSuggestion>> {
        let Some(method) = self.methods.gas_price.clone() else {
            return Ok(None);
        };
        self.inner.request_noparams(method).await.map(Some)
    }

    /// Vendor status lookup; `None` when no method is configured.
    pub async fn get_user_op_status(
        &self,
        user_op_hash: B256,
    ) -> TransportResult<Option<UserOpStatus>> {
        let Some(method) = self.methods.status.clone() else {
            return Ok(None);
        };
        self.inner.request(method, [user_op_hash]).await.map(Some)
    }
}
