//! Scripted JSON-RPC transport for tests.
//!
//! Responses are queued per method. The last queued response for a method is
//! sticky and keeps being returned, so a test only scripts the transitions it
//! cares about. Every request is recorded for later assertions.

use alloy::{
    providers::RootProvider,
    rpc::{
        client::RpcClient,
        json_rpc::{RequestPacket, Response, ResponsePacket, SerializedRequest},
    },
    transports::{TransportError, TransportErrorKind, TransportFut, http::reqwest::Url},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    task,
};
use tower::Service;

use crate::chain::Chain;
use crate::rpc_clients::{BundlerClient, BundlerMethods, PaymasterClient, PublicClient};

#[derive(Debug, Clone)]
pub enum MockResponse {
    Result(Value),
    Error {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    /// Fails below the JSON-RPC layer, like a dropped connection.
    TransportFailure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, VecDeque<MockResponse>>,
    requests: Vec<RecordedRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, method: &str, response: MockResponse) -> &Self {
        self.state()
            .responses
            .entry(method.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn push_result(&self, method: &str, result: impl Serialize) -> &Self {
        let value = serde_json::to_value(result).unwrap_or(Value::Null);
        self.push(method, MockResponse::Result(value))
    }

    pub fn push_error(&self, method: &str, code: i64, message: &str, data: Option<Value>) -> &Self {
        self.push(
            method,
            MockResponse::Error {
                code,
                message: message.to_string(),
                data,
            },
        )
    }

    pub fn push_transport_failure(&self, method: &str, message: &str) -> &Self {
        self.push(method, MockResponse::TransportFailure(message.to_string()))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn requests_for(&self, method: &str) -> Vec<RecordedRequest> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.requests_for(method).len()
    }

    pub fn rpc_client(&self) -> RpcClient {
        RpcClient::builder().transport(self.clone(), true)
    }

    fn next_response(&self, request: &SerializedRequest) -> Option<MockResponse> {
        let mut state = self.state();

        let params = request
            .params()
            .and_then(|raw| serde_json::from_str(raw.get()).ok())
            .unwrap_or(Value::Null);
        state.requests.push(RecordedRequest {
            method: request.method().to_string(),
            params,
        });

        let queue = state.responses.get_mut(request.method())?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn respond(&self, request: &SerializedRequest) -> Result<Response, TransportError> {
        let id = request.id();
        let body = match self.next_response(request) {
            Some(MockResponse::Result(result)) => {
                json!({ "jsonrpc": "2.0", "id": id, "result": result })
            }
            Some(MockResponse::Error {
                code,
                message,
                data,
            }) => {
                let mut error = json!({ "code": code, "message": message });
                if let Some(data) = data {
                    error["data"] = data;
                }
                json!({ "jsonrpc": "2.0", "id": id, "error": error })
            }
            Some(MockResponse::TransportFailure(message)) => {
                return Err(TransportErrorKind::custom_str(&message));
            }
            None => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": -32601,
                    "message": format!("method not scripted: {}", request.method()),
                }
            }),
        };

        let text = body.to_string();
        serde_json::from_str(&text).map_err(|err| TransportError::deser_err(err, text))
    }
}

impl Service<RequestPacket> for MockTransport {
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, _cx: &mut task::Context<'_>) -> task::Poll<Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        let result = match req {
            RequestPacket::Single(request) => self.respond(&request).map(ResponsePacket::Single),
            RequestPacket::Batch(requests) => requests
                .iter()
                .map(|request| self.respond(request))
                .collect::<Result<Vec<_>, _>>()
                .map(ResponsePacket::Batch),
        };
        Box::pin(async move { result })
    }
}

/// A [`Chain`] whose three endpoints are independent [`MockTransport`]s.
#[derive(Debug, Clone)]
pub struct MockChain {
    chain_id: u64,
    public: MockTransport,
    bundler: MockTransport,
    paymaster: Option<MockTransport>,
    public_client: PublicClient,
    bundler_client: BundlerClient,
    paymaster_client: Option<PaymasterClient>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self::with_bundler_methods(chain_id, BundlerMethods::default())
    }

    pub fn with_bundler_methods(chain_id: u64, methods: BundlerMethods) -> Self {
        let public = MockTransport::new();
        let bundler = MockTransport::new();
        Self {
            chain_id,
            public_client: PublicClient::new(RootProvider::new(public.rpc_client())),
            bundler_client: BundlerClient::from_rpc_client(bundler.rpc_client())
                .with_methods(methods),
            public,
            bundler,
            paymaster: None,
            paymaster_client: None,
        }
    }

    pub fn with_paymaster(mut self) -> Self {
        let paymaster = MockTransport::new();
        self.paymaster_client = Some(PaymasterClient {
            inner: paymaster.rpc_client(),
        });
        self.paymaster = Some(paymaster);
        self
    }

    pub fn public(&self) -> &MockTransport {
        &self.public
    }

    pub fn bundler(&self) -> &MockTransport {
        &self.bundler
    }

    pub fn paymaster(&self) -> Option<&MockTransport> {
        self.paymaster.as_ref()
    }
}

fn mock_url(host: &str) -> Url {
    Url::parse(&format!("http://{host}.mock/")).expect("static mock url")
}

impl Chain for MockChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn rpc_url(&self) -> Url {
        mock_url("rpc")
    }

    fn bundler_url(&self) -> Url {
        mock_url("bundler")
    }

    fn paymaster_url(&self) -> Option<Url> {
        self.paymaster.as_ref().map(|_| mock_url("paymaster"))
    }

    fn public_client(&self) -> &PublicClient {
        &self.public_client
    }

    fn bundler_client(&self) -> &BundlerClient {
        &self.bundler_client
    }

    fn paymaster_client(&self) -> Option<&PaymasterClient> {
        self.paymaster_client.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, B256};

    use super::*;
    use crate::error::{AlloyRpcErrorToEngineError, EngineError, RpcErrorKind};

    #[tokio::test]
    async fn last_response_is_sticky() {
        let chain = MockChain::new(1);
        chain
            .bundler()
            .push_result("eth_supportedEntryPoints", vec![Address::ZERO])
            .push_result(
                "eth_supportedEntryPoints",
                vec![Address::ZERO, Address::repeat_byte(1)],
            );

        let client = chain.bundler_client();
        assert_eq!(client.supported_entry_points().await.unwrap().len(), 1);
        assert_eq!(client.supported_entry_points().await.unwrap().len(), 2);
        assert_eq!(client.supported_entry_points().await.unwrap().len(), 2);
        assert_eq!(chain.bundler().call_count("eth_supportedEntryPoints"), 3);
    }

    #[tokio::test]
    async fn error_payload_is_preserved() {
        let chain = MockChain::new(10);
        chain.bundler().push_error(
            "eth_getUserOperationReceipt",
            -32507,
            "AA24 signature error",
            Some(json!({ "reason": "bad sig" })),
        );

        let err = chain
            .bundler_client()
            .get_user_op_receipt(B256::ZERO)
            .await
            .unwrap_err()
            .to_engine_bundler_error(&chain);

        let EngineError::BundlerError { kind, chain_id, .. } = err else {
            panic!("expected bundler error");
        };
        assert_eq!(chain_id, 10);
        let resp = kind.error_response().unwrap();
        assert_eq!(resp.code, -32507);
        assert_eq!(resp.message, "AA24 signature error");
        assert_eq!(resp.data.as_deref(), Some(r#"{"reason":"bad sig"}"#));
    }

    #[tokio::test]
    async fn unscripted_methods_fail_with_method_not_found() {
        let chain = MockChain::new(1);
        let err = chain
            .bundler_client()
            .supported_entry_points()
            .await
            .unwrap_err()
            .to_engine_bundler_error(&chain);
        assert!(matches!(
            err.rpc_kind(),
            Some(RpcErrorKind::ErrorResp(resp)) if resp.code == -32601
        ));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn transport_failures_are_transient() {
        let chain = MockChain::new(1);
        chain
            .bundler()
            .push_transport_failure("eth_getUserOperationReceipt", "connection reset");

        let err = chain
            .bundler_client()
            .get_user_op_receipt(B256::ZERO)
            .await
            .unwrap_err()
            .to_engine_bundler_error(&chain);
        assert!(err.is_transient());
    }
}
