use crate::rpc_clients::{
    BundlerClient, BundlerMethods, PaymasterClient, PublicClient,
    transport::{ChainTransports, Endpoint},
};
use alloy::{
    providers::RootProvider, rpc::client::RpcClient,
    transports::http::reqwest::header::HeaderMap,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::error::EngineError;

/// The three JSON-RPC endpoints a user operation travels through.
pub trait Chain: Send + Sync {
    fn chain_id(&self) -> u64;
    fn rpc_url(&self) -> Url;
    fn bundler_url(&self) -> Url;
    fn paymaster_url(&self) -> Option<Url>;

    fn public_client(&self) -> &PublicClient;
    fn bundler_client(&self) -> &BundlerClient;
    fn paymaster_client(&self) -> Option<&PaymasterClient>;

    fn provider(&self) -> &RootProvider {
        self.public_client().provider()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: Url,
    pub bundler_url: Url,
    #[serde(default)]
    pub paymaster_url: Option<Url>,
    /// Headers sent to the bundler and paymaster, e.g. API keys.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub bundler_methods: BundlerMethods,
}

#[derive(Clone)]
pub struct RpcChain {
    transports: ChainTransports,

    chain_id: u64,
    rpc_url: Url,
    bundler_url: Url,
    paymaster_url: Option<Url>,
    bundler_methods: BundlerMethods,

    pub bundler_client: BundlerClient,
    pub paymaster_client: Option<PaymasterClient>,
    pub public_client: PublicClient,
}

impl Chain for RpcChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn rpc_url(&self) -> Url {
        self.rpc_url.clone()
    }

    fn bundler_url(&self) -> Url {
        self.bundler_url.clone()
    }

    fn paymaster_url(&self) -> Option<Url> {
        self.paymaster_url.clone()
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

fn build_bundler_client(
    transports: &ChainTransports,
    url: &Url,
    methods: &BundlerMethods,
) -> BundlerClient {
    let transport = transports.transport(Endpoint::Bundler, url.clone());
    BundlerClient::from_rpc_client(RpcClient::builder().transport(transport, false))
        .with_methods(methods.clone())
}

fn build_paymaster_client(
    transports: &ChainTransports,
    url: Option<&Url>,
) -> Option<PaymasterClient> {
    let transport = transports.transport(Endpoint::Paymaster, url?.clone());
    Some(PaymasterClient {
        inner: RpcClient::builder().transport(transport, false),
    })
}

impl RpcChain {
    /// A copy whose bundler and paymaster clients send `headers` on top of the
    /// configured ones, still over the same connection pool.
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let transports = self.transports.with_headers(headers);
        let mut chain = self.clone();
        chain.bundler_client =
            build_bundler_client(&transports, &self.bundler_url, &self.bundler_methods);
        chain.paymaster_client = build_paymaster_client(&transports, self.paymaster_url.as_ref());
        chain.transports = transports;
        chain
    }

    pub fn headers(&self) -> &HeaderMap {
        self.transports.headers()
    }
}

impl ChainConfig {
    pub fn to_chain(&self) -> Result<RpcChain, EngineError> {
        let transports = ChainTransports::new(self.chain_id, &self.headers)?;

        let public = transports.transport(Endpoint::Public, self.rpc_url.clone());
        let provider = RootProvider::new(RpcClient::builder().transport(public, false));

        Ok(RpcChain {
            bundler_client: build_bundler_client(
                &transports,
                &self.bundler_url,
                &self.bundler_methods,
            ),
            paymaster_client: build_paymaster_client(&transports, self.paymaster_url.as_ref()),
            public_client: PublicClient::new(provider),
            transports,
            chain_id: self.chain_id,
            rpc_url: self.rpc_url.clone(),
            bundler_url: self.bundler_url.clone(),
            paymaster_url: self.paymaster_url.clone(),
            bundler_methods: self.bundler_methods.clone(),
        })
    }
}
