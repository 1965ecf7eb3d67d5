use aakit_aa_types::{UserOpError, codec::CodecError};
use alloy::{
    primitives::Address,
    transports::{RpcError as AlloyRpcError, TransportErrorKind},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::Chain;

#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcErrorKind {
    /// Server returned an error response.
    #[error("server returned an error response: {0}")]
    ErrorResp(RpcErrorResponse),

    /// Server returned a null response when a non-null response was expected.
    #[error("server returned a null response when a non-null response was expected")]
    NullResp,

    /// Rpc server returned an unsupported feature.
    #[error("unsupported feature: {message}")]
    UnsupportedFeature { message: String },

    /// Returned when a local pre-processing step fails.
    #[error("local usage error: {message}")]
    InternalError { message: String },

    /// JSON serialization error.
    #[error("serialization error: {message}")]
    SerError { message: String },

    /// JSON deserialization error.
    #[error("deserialization error: {message}, text: {text}")]
    DeserError {
        message: String,
        /// The text that failed to deserialize.
        text: String,
    },

    #[error("HTTP error {status}")]
    TransportHttpError { status: u16, body: String },

    #[error("Other transport error: {message}")]
    OtherTransportError { message: String },
}

impl RpcErrorKind {
    /// Failures of the transport itself, as opposed to a well-formed answer.
    ///
    /// Rate limiting and 5xx responses count as transient; error responses,
    /// malformed payloads and 4xx statuses do not.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcErrorKind::TransportHttpError { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            RpcErrorKind::OtherTransportError { .. } => true,
            _ => false,
        }
    }

    pub fn error_response(&self) -> Option<&RpcErrorResponse> {
        match self {
            RpcErrorKind::ErrorResp(resp) => Some(resp),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RpcErrorResponse {
    /// The error code.
    pub code: i64,
    /// The error message (if any).
    pub message: String,
    /// The raw JSON error data (if any), as returned by the server.
    pub data: Option<String>,
}

impl std::fmt::Display for RpcErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, ", data: {data}")?;
        }
        Ok(())
    }
}

/// A serializable contract interaction error type
#[derive(Debug, Error, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractInteractionErrorKind {
    /// The contract returned no data.
    #[error(
        "contract call to `{function}` returned no data (\"0x\"); the called address might not be a contract"
    )]
    ZeroData { function: String, message: String },

    /// An error occurred ABI encoding or decoding.
    #[error("ABI error: {message}")]
    AbiError { message: String },

    /// An error occurred interacting with a contract over RPC.
    #[error("transport error: {message}")]
    TransportError { message: String },

    /// Error during result decoding
    #[error("result decoding failed: {message}")]
    ResultDecodingFailed { message: String },

    #[error("{message}")]
    Other { message: String },
}

#[derive(Error, Debug, Serialize, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "type")]
pub enum EngineError {
    #[error("RPC error on chain {chain_id} at {rpc_url}: {message}")]
    RpcError {
        chain_id: u64,
        rpc_url: String,
        message: String,
        kind: RpcErrorKind,
    },

    #[error("Paymaster error on chain {chain_id} at {rpc_url}: {message}")]
    PaymasterError {
        chain_id: u64,
        rpc_url: String,
        message: String,
        kind: RpcErrorKind,
    },

    #[error("Bundler error on chain {chain_id} at {rpc_url}: {message}")]
    BundlerError {
        chain_id: u64,
        rpc_url: String,
        message: String,
        kind: RpcErrorKind,
    },

    #[error("Bad RPC configuration: {message}")]
    RpcConfigError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Contract interaction error: {message}")]
    #[serde(rename_all = "camelCase")]
    ContractInteractionError {
        contract_address: Option<Address>,
        chain_id: u64,
        message: String,
        kind: ContractInteractionErrorKind,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("{owner} owner does not support {operation}")]
    UnsupportedOperation { operation: String, owner: String },

    #[error("Signing error: {message}")]
    SigningError { message: String },

    #[error("Invalid signature: {message}")]
    InvalidSignature { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::ValidationError {
            message: message.into(),
        }
    }

    pub fn contract_decoding_error(
        contract_address: Option<Address>,
        chain_id: u64,
        message: String,
    ) -> Self {
        EngineError::ContractInteractionError {
            contract_address,
            chain_id,
            message: message.clone(),
            kind: ContractInteractionErrorKind::ResultDecodingFailed { message },
        }
    }

    /// The RPC error kind, for the three RPC-backed variants.
    pub fn rpc_kind(&self) -> Option<&RpcErrorKind> {
        match self {
            EngineError::RpcError { kind, .. }
            | EngineError::BundlerError { kind, .. }
            | EngineError::PaymasterError { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.rpc_kind().is_some_and(RpcErrorKind::is_transient)
    }
}

impl From<CodecError> for EngineError {
    fn from(err: CodecError) -> Self {
        EngineError::ValidationError {
            message: err.to_string(),
        }
    }
}

impl From<UserOpError> for EngineError {
    fn from(err: UserOpError) -> Self {
        EngineError::ValidationError {
            message: err.to_string(),
        }
    }
}

impl From<::config::ConfigError> for EngineError {
    fn from(err: ::config::ConfigError) -> Self {
        EngineError::ConfigError {
            message: err.to_string(),
        }
    }
}

pub trait AlloyRpcErrorToEngineError {
    fn to_engine_error(&self, chain: &impl Chain) -> EngineError;
    fn to_engine_bundler_error(&self, chain: &impl Chain) -> EngineError;
    fn to_engine_paymaster_error(&self, chain: &impl Chain) -> EngineError;
}

fn to_engine_rpc_error_kind(err: &AlloyRpcError<TransportErrorKind>) -> RpcErrorKind {
    match err {
        AlloyRpcError::ErrorResp(err) => RpcErrorKind::ErrorResp(RpcErrorResponse {
            code: err.code,
            message: err.message.to_string(),
            data: err.data.as_ref().map(|data| data.get().to_string()),
        }),
        AlloyRpcError::NullResp => RpcErrorKind::NullResp,
        AlloyRpcError::UnsupportedFeature(feature) => RpcErrorKind::UnsupportedFeature {
            message: feature.to_string(),
        },
        AlloyRpcError::LocalUsageError(err) => RpcErrorKind::InternalError {
            message: err.to_string(),
        },
        AlloyRpcError::SerError(err) => RpcErrorKind::SerError {
            message: err.to_string(),
        },
        AlloyRpcError::DeserError { err, text } => RpcErrorKind::DeserError {
            message: err.to_string(),
            text: text.to_string(),
        },
        AlloyRpcError::Transport(err) => match err {
            TransportErrorKind::HttpError(err) => RpcErrorKind::TransportHttpError {
                status: err.status,
                body: err.body.to_string(),
            },
            _ => RpcErrorKind::OtherTransportError {
                message: err.to_string(),
            },
        },
    }
}

impl AlloyRpcErrorToEngineError for AlloyRpcError<TransportErrorKind> {
    fn to_engine_error(&self, chain: &impl Chain) -> EngineError {
        EngineError::RpcError {
            chain_id: chain.chain_id(),
            rpc_url: chain.rpc_url().to_string(),
            message: self.to_string(),
            kind: to_engine_rpc_error_kind(self),
        }
    }

    fn to_engine_bundler_error(&self, chain: &impl Chain) -> EngineError {
        EngineError::BundlerError {
            chain_id: chain.chain_id(),
            rpc_url: chain.bundler_url().to_string(),
            message: self.to_string(),
            kind: to_engine_rpc_error_kind(self),
        }
    }

    fn to_engine_paymaster_error(&self, chain: &impl Chain) -> EngineError {
        EngineError::PaymasterError {
            chain_id: chain.chain_id(),
            rpc_url: chain
                .paymaster_url()
                .map(|url| url.to_string())
                .unwrap_or_default(),
            message: self.to_string(),
            kind: to_engine_rpc_error_kind(self),
        }
    }
}

pub trait ContractErrorToEngineError {
    fn to_engine_error(self, chain_id: u64, contract_address: Option<Address>) -> EngineError;
}

impl ContractErrorToEngineError for alloy::contract::Error {
    fn to_engine_error(self, chain_id: u64, contract_address: Option<Address>) -> EngineError {
        let (message, kind) = match self {
            alloy::contract::Error::ZeroData(function, err) => (
                format!("Zero data returned from contract call to {function}"),
                ContractInteractionErrorKind::ZeroData {
                    function,
                    message: err.to_string(),
                },
            ),
            alloy::contract::Error::AbiError(err) => (
                format!("ABI error: {err}"),
                ContractInteractionErrorKind::AbiError {
                    message: err.to_string(),
                },
            ),
            alloy::contract::Error::TransportError(err) => (
                format!("Transport error: {err}"),
                ContractInteractionErrorKind::TransportError {
                    message: err.to_string(),
                },
            ),
            other => (
                other.to_string(),
                ContractInteractionErrorKind::Other {
                    message: other.to_string(),
                },
            ),
        };

        EngineError::ContractInteractionError {
            contract_address,
            chain_id,
            message,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(
            RpcErrorKind::TransportHttpError {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            RpcErrorKind::TransportHttpError {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !RpcErrorKind::TransportHttpError {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !RpcErrorKind::ErrorResp(RpcErrorResponse {
                code: -32500,
                message: "AA21 didn't pay prefund".to_string(),
                data: None,
            })
            .is_transient()
        );
    }

    #[test]
    fn bundler_error_serializes_with_payload() {
        let err = EngineError::BundlerError {
            chain_id: 1,
            rpc_url: "http://bundler".to_string(),
            message: "rejected".to_string(),
            kind: RpcErrorKind::ErrorResp(RpcErrorResponse {
                code: -32602,
                message: "invalid params".to_string(),
                data: Some("{\"reason\":\"AA25\"}".to_string()),
            }),
        };

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "BUNDLER_ERROR");
        assert_eq!(json["kind"]["type"], "ERROR_RESP");
        assert_eq!(json["kind"]["code"], -32602);
        assert_eq!(json["kind"]["data"], "{\"reason\":\"AA25\"}");
    }

    #[test]
    fn codec_errors_become_validation_errors() {
        let err: EngineError = aakit_aa_types::address::parse_address("0x12")
            .unwrap_err()
            .into();
        assert!(matches!(err, EngineError::ValidationError { .. }));
    }
}
