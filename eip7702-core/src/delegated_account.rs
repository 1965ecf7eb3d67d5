use alloy::{
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, Bytes, U256},
};
use aakit_core::{
    chain::Chain,
    error::{AlloyRpcErrorToEngineError, EngineError},
    owner::{KeyOwner, Owner},
};

use crate::constants::{EIP_7702_DELEGATION_CODE_LENGTH, EIP_7702_DELEGATION_PREFIX};

/// Whether the code carries the EIP-7702 delegation marker.
pub fn is_delegation_designator(code: &[u8]) -> bool {
    code.starts_with(&EIP_7702_DELEGATION_PREFIX)
}

/// The delegate an EOA's code points at, if the code is a delegation designator.
pub fn delegation_target(code: &[u8]) -> Option<Address> {
    if code.len() != EIP_7702_DELEGATION_CODE_LENGTH
        || !code.starts_with(&EIP_7702_DELEGATION_PREFIX)
    {
        return None;
    }
    Some(Address::from_slice(&code[3..EIP_7702_DELEGATION_CODE_LENGTH]))
}

/// An EOA that may carry EIP-7702 delegation, on a specific chain
#[derive(Clone, Debug)]
pub struct DelegatedAccount<'a, C: Chain> {
    /// The EOA address that may have delegation
    pub eoa_address: Address,
    pub chain: &'a C,
}

impl<'a, C: Chain> DelegatedAccount<'a, C> {
    pub fn new(eoa_address: Address, chain: &'a C) -> Self {
        Self { eoa_address, chain }
    }

    pub fn address(&self) -> Address {
        self.eoa_address
    }

    async fn code(&self) -> Result<Bytes, EngineError> {
        self.chain
            .public_client()
            .get_code(self.eoa_address)
            .await
            .map_err(|e| e.to_engine_error(self.chain))
    }

    /// Current delegate of the EOA, `None` when it has no designator.
    pub async fn delegation(&self) -> Result<Option<Address>, EngineError> {
        let code = self.code().await?;
        let target = delegation_target(&code);

        tracing::debug!(
            eoa_address = ?self.eoa_address,
            code_length = code.len(),
            target_address = ?target,
            "Checking EIP-7702 delegation"
        );

        Ok(target)
    }

    /// Whether the EOA's code starts with the delegation marker, whatever it
    /// delegates to.
    pub async fn is_delegated(&self) -> Result<bool, EngineError> {
        let code = self.code().await?;
        let delegated = is_delegation_designator(&code);

        tracing::debug!(
            eoa_address = ?self.eoa_address,
            code_length = code.len(),
            delegated,
            "Checking EIP-7702 delegation"
        );

        Ok(delegated)
    }

    /// Get the current nonce for the EOA
    pub async fn get_nonce(&self) -> Result<u64, EngineError> {
        self.chain
            .public_client()
            .get_transaction_count(self.eoa_address)
            .await
            .map_err(|e| e.to_engine_error(self.chain))
    }

    /// Sign an authorization for `delegate` at the EOA's current nonce.
    pub async fn sign_authorization(
        &self,
        owner: &KeyOwner,
        delegate: Address,
    ) -> Result<SignedAuthorization, EngineError> {
        if owner.address() != self.eoa_address {
            return Err(EngineError::validation(format!(
                "Owner {} cannot authorize delegation for {}",
                owner.address(),
                self.eoa_address
            )));
        }

        let nonce = self.get_nonce().await?;
        let authorization = Authorization {
            chain_id: U256::from(self.chain.chain_id()),
            address: delegate,
            nonce,
        };

        tracing::debug!(
            eoa_address = ?self.eoa_address,
            delegate = ?delegate,
            nonce,
            "Signing EIP-7702 authorization"
        );

        owner.sign_authorization(authorization)
    }

    /// An authorization for `delegate` to attach to the next submission, or
    /// `None` when the EOA already carries any delegation. Re-delegating an
    /// EOA that points elsewhere goes through [`Self::sign_authorization`].
    pub async fn authorization_if_needed(
        &self,
        owner: &KeyOwner,
        delegate: Address,
    ) -> Result<Option<SignedAuthorization>, EngineError> {
        if self.is_delegated().await? {
            return Ok(None);
        }
        self.sign_authorization(owner, delegate).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, hex};

    #[test]
    fn parses_designator() {
        let code = hex!("ef0100e6cae83bde06e4c305530e199d7217f42808555b");
        assert_eq!(
            delegation_target(&code),
            Some(address!("0xe6Cae83BdE06E4c305530e199D7217f42808555B"))
        );
    }

    #[test]
    fn ignores_regular_bytecode() {
        assert_eq!(delegation_target(&[]), None);
        assert_eq!(delegation_target(&hex!("6080604052")), None);

        let mut long = hex!("ef0100e6cae83bde06e4c305530e199d7217f42808555b").to_vec();
        long.push(0);
        assert_eq!(delegation_target(&long), None);
    }

    #[test]
    fn any_marker_counts_as_delegated() {
        assert!(is_delegation_designator(&hex!(
            "ef01004242424242424242424242424242424242424242"
        )));
        assert!(is_delegation_designator(&hex!("ef0100")));
        assert!(!is_delegation_designator(&hex!("ef02004242")));
        assert!(!is_delegation_designator(&[]));
    }
}
