use std::{collections::BTreeMap, fmt, sync::Arc, task};

use alloy::{
    rpc::json_rpc::{RequestPacket, ResponsePacket},
    transports::{
        TransportError, TransportErrorKind, TransportFut, TransportResult,
        http::reqwest::{
            self, Url,
            header::{HeaderMap, HeaderName, HeaderValue},
        },
    },
};
use tower::Service;
use tracing::{Instrument, debug, debug_span, trace};

use crate::error::EngineError;

/// Which of a chain's three JSON-RPC endpoints a transport talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Public,
    Bundler,
    Paymaster,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Public => "public",
            Endpoint::Bundler => "bundler",
            Endpoint::Paymaster => "paymaster",
        }
    }

    /// Configured chain headers (API keys) go to the bundler and paymaster only.
    fn carries_chain_headers(&self) -> bool {
        !matches!(self, Endpoint::Public)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a chain's configured header map, rejecting names and values reqwest
/// would refuse at send time.
pub fn parse_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, EngineError> {
    let mut parsed = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| EngineError::RpcConfigError {
                message: format!("Invalid header name {name}: {e}"),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| EngineError::RpcConfigError {
                message: format!("Invalid value for header {name}: {e}"),
            })?;
        parsed.insert(header_name, header_value);
    }
    Ok(parsed)
}

/// One endpoint of one chain, posting JSON-RPC over the chain's pooled
/// reqwest client.
#[derive(Clone, Debug)]
pub struct ChainTransport {
    client: reqwest::Client,
    url: Url,
    headers: Arc<HeaderMap>,
    chain_id: u64,
    endpoint: Endpoint,
}

impl ChainTransport {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    fn request(&self, req: &RequestPacket) -> reqwest::RequestBuilder {
        self.client
            .post(self.url.clone())
            .headers(self.headers.as_ref().clone())
            .json(req)
    }

    async fn do_request(self, req: RequestPacket) -> TransportResult<ResponsePacket> {
        let resp = self
            .request(&req)
            .send()
            .await
            .map_err(TransportErrorKind::custom)?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(TransportErrorKind::custom)?;
        debug!(?status, bytes = body.len(), "received response");
        trace!(body = ?String::from_utf8_lossy(&body), "response body");

        if !status.is_success() {
            return Err(TransportErrorKind::http_error(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        serde_json::from_slice(&body)
            .map_err(|err| TransportError::deser_err(err, String::from_utf8_lossy(&body)))
    }
}

impl Service<RequestPacket> for ChainTransport {
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    #[inline]
    fn poll_ready(&mut self, _cx: &mut task::Context<'_>) -> task::Poll<Result<(), Self::Error>> {
        // reqwest always returns ready
        task::Poll::Ready(Ok(()))
    }

    #[inline]
    fn call(&mut self, req: RequestPacket) -> Self::Future {
        let this = self.clone();
        let span = debug_span!(
            "rpc",
            chain_id = this.chain_id,
            endpoint = %this.endpoint,
            url = %this.url,
        );
        Box::pin(this.do_request(req).instrument(span))
    }
}

/// Hands out transports for a chain's endpoints. They share one connection
/// pool and the chain's configured headers.
#[derive(Clone, Debug)]
pub struct ChainTransports {
    client: reqwest::Client,
    chain_id: u64,
    headers: HeaderMap,
}

impl ChainTransports {
    pub fn new(chain_id: u64, headers: &BTreeMap<String, String>) -> Result<Self, EngineError> {
        let headers = parse_headers(headers)?;
        let client = reqwest::ClientBuilder::new()
            .build()
            .map_err(|e| EngineError::RpcConfigError {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            chain_id,
            headers,
        })
    }

    /// The same pool with `overrides` layered over the configured headers.
    pub fn with_headers(&self, overrides: HeaderMap) -> Self {
        let mut headers = self.headers.clone();
        headers.extend(overrides);
        Self {
            client: self.client.clone(),
            chain_id: self.chain_id,
            headers,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn transport(&self, endpoint: Endpoint, url: Url) -> ChainTransport {
        let headers = if endpoint.carries_chain_headers() {
            self.headers.clone()
        } else {
            HeaderMap::new()
        };
        ChainTransport {
            client: self.client.clone(),
            url,
            headers: Arc::new(headers),
            chain_id: self.chain_id,
            endpoint,
        }
    }
}
