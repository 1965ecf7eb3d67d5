use alloy::{
    primitives::{Address, Bytes, U256, aliases::U192},
    providers::{Provider, RootProvider},
    rpc::types::eth::TransactionRequest,
    sol,
    transports::TransportResult,
};

sol! {
    #[sol(rpc)]
    contract EntryPointNonces {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }
}

/// Chain reads needed while building a user operation.
#[derive(Debug, Clone)]
pub struct PublicClient {
    provider: RootProvider,
}

impl PublicClient {
    pub fn new(provider: RootProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &RootProvider {
        &self.provider
    }

    pub async fn get_balance(&self, address: Address) -> TransportResult<U256> {
        self.provider.get_balance(address).await
    }

    pub async fn get_code(&self, address: Address) -> TransportResult<Bytes> {
        self.provider.get_code_at(address).await
    }

    /// True when the address carries any code, delegation designators included.
    pub async fn is_contract(&self, address: Address) -> TransportResult<bool> {
        Ok(!self.get_code(address).await?.is_empty())
    }

    pub async fn get_transaction_count(&self, address: Address) -> TransportResult<u64> {
        self.provider.get_transaction_count(address).await
    }

    pub async fn call(&self, to: Address, data: Bytes) -> TransportResult<Bytes> {
        let request = TransactionRequest::default().to(to).input(data.into());
        self.provider.call(request).await
    }

    /// `EntryPoint.getNonce(sender, key)`; the key selects an independent nonce sequence.
    pub async fn get_entrypoint_nonce(
        &self,
        entrypoint: Address,
        sender: Address,
        key: U192,
    ) -> Result<U256, alloy::contract::Error> {
        EntryPointNonces::new(entrypoint, self.provider.clone())
            .getNonce(sender, key)
            .call()
            .await
    }
}
