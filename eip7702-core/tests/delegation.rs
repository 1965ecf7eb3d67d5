use aakit_core::{
    error::{EngineError, RpcErrorKind},
    owner::{KeyOwner, Owner},
    rpc_clients::mock::MockChain,
};
use aakit_eip7702_core::{DelegatedAccount, constants::SIMPLE_7702_DELEGATE};
use alloy::primitives::{Address, Signature, U256};

const ANVIL_KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

fn owner() -> KeyOwner {
    KeyOwner::from_private_key(ANVIL_KEY_1).unwrap()
}

#[tokio::test]
async fn undelegated_eoa_gets_an_authorization() {
    let chain = MockChain::new(8453);
    chain
        .public()
        .push_result("eth_getCode", "0x")
        .push_result("eth_getTransactionCount", "0x7");

    let owner = owner();
    let account = DelegatedAccount::new(owner.address(), &chain);

    let signed = account
        .authorization_if_needed(&owner, SIMPLE_7702_DELEGATE)
        .await
        .unwrap()
        .expect("authorization required");

    assert_eq!(signed.chain_id, U256::from(8453));
    assert_eq!(signed.address, SIMPLE_7702_DELEGATE);
    assert_eq!(signed.nonce, 7);

    let recovered = Signature::new(signed.r(), signed.s(), signed.y_parity() == 1)
        .recover_address_from_prehash(&signed.signature_hash())
        .unwrap();
    assert_eq!(recovered, owner.address());
}

#[tokio::test]
async fn delegated_eoa_needs_no_authorization() {
    let chain = MockChain::new(8453);
    chain.public().push_result(
        "eth_getCode",
        format!("0xef0100{}", alloy::hex::encode(SIMPLE_7702_DELEGATE)),
    );

    let owner = owner();
    let account = DelegatedAccount::new(owner.address(), &chain);

    assert_eq!(account.delegation().await.unwrap(), Some(SIMPLE_7702_DELEGATE));
    assert!(
        account
            .authorization_if_needed(&owner, SIMPLE_7702_DELEGATE)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(chain.public().call_count("eth_getTransactionCount"), 0);
}

#[tokio::test]
async fn delegation_elsewhere_is_left_in_place() {
    let chain = MockChain::new(1);
    chain.public().push_result(
        "eth_getCode",
        format!("0xef0100{}", alloy::hex::encode(Address::repeat_byte(0x42))),
    );

    let owner = owner();
    let account = DelegatedAccount::new(owner.address(), &chain);
    let signed = account
        .authorization_if_needed(&owner, SIMPLE_7702_DELEGATE)
        .await
        .unwrap();

    assert!(signed.is_none());
    assert_eq!(chain.public().call_count("eth_getTransactionCount"), 0);
}

#[tokio::test]
async fn explicit_authorization_replaces_a_delegation() {
    let chain = MockChain::new(1);
    chain.public().push_result("eth_getTransactionCount", "0x3");

    let owner = owner();
    let account = DelegatedAccount::new(owner.address(), &chain);
    let signed = account
        .sign_authorization(&owner, SIMPLE_7702_DELEGATE)
        .await
        .unwrap();

    assert_eq!(signed.address, SIMPLE_7702_DELEGATE);
    assert_eq!(signed.nonce, 3);
}

#[tokio::test]
async fn foreign_owner_cannot_authorize() {
    let chain = MockChain::new(1);
    let account = DelegatedAccount::new(Address::repeat_byte(0x11), &chain);

    let err = account
        .sign_authorization(&owner(), SIMPLE_7702_DELEGATE)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationError { .. }));
    assert!(chain.public().requests().is_empty());
}

#[tokio::test]
async fn rpc_failures_keep_their_payload() {
    let chain = MockChain::new(1);
    chain
        .public()
        .push_error("eth_getCode", -32000, "header not found", None);

    let account = DelegatedAccount::new(owner().address(), &chain);
    let err = account.delegation().await.unwrap_err();

    match err.rpc_kind() {
        Some(RpcErrorKind::ErrorResp(resp)) => {
            assert_eq!(resp.code, -32000);
            assert_eq!(resp.message, "header not found");
        }
        other => panic!("unexpected error kind: {other:?}"),
    }
}
