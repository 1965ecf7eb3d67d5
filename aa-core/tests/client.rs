mod fixtures;

use aakit_aa_types::{
    EntryPointVersion, VersionedUserOp,
    status::{
        CallStatusKind, STATUS_CONFIRMED, STATUS_OFFCHAIN_FAILURE, STATUS_PENDING, STATUS_REVERTED,
    },
};
use aakit_aa_core::{
    AccountHandle, SmartAccountClient,
    accounts::{Simple7702Account, SimpleAccount},
    userop::{PollOutcome, PrepareOptions, Sponsorship},
};
use aakit_core::{
    call::Call, config::EngineConfig, error::EngineError, owner::Owner,
    rpc_clients::mock::MockChain,
};
use alloy::primitives::{Address, B256, U256, address};
use fixtures::{
    ANVIL_KEY_0, ANVIL_KEY_1, address_word, key, receipt_json, script_bundler_gas,
    setup_tracing, uint_word,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const SENDER: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
const SIMPLE_7702_DESIGNATOR: &str = "0xef0100e6cae83bde06e4c305530e199d7217f42808555b";

fn transfer() -> Call {
    Call::transfer(address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"), U256::from(1))
}

fn simple_7702_client(chain: &MockChain) -> SmartAccountClient<MockChain> {
    let account = Simple7702Account::new(key(ANVIL_KEY_1), 8453).unwrap();
    SmartAccountClient::new(chain.clone(), AccountHandle::new(account)).unwrap()
}

#[test]
fn rejects_accounts_for_another_chain() {
    let account = SimpleAccount::new(key(ANVIL_KEY_0), 10, EntryPointVersion::V0_7).unwrap();
    let result = SmartAccountClient::new(MockChain::new(1), AccountHandle::new(account));

    assert!(matches!(result, Err(EngineError::ValidationError { .. })));
}

#[tokio::test]
async fn undelegated_eoa_sends_its_authorization() {
    setup_tracing();
    let chain = MockChain::new(8453);
    chain.public().push_result("eth_call", uint_word(0));
    chain.public().push_result("eth_getCode", "0x");
    chain.public().push_result("eth_getTransactionCount", "0x2");
    script_bundler_gas(&chain);
    let client = simple_7702_client(&chain);

    let prepared = client
        .prepare(&[transfer()], PrepareOptions::default())
        .await
        .unwrap();
    let signed = client.sign(prepared).unwrap();
    assert_eq!(signed.user_op.signature().len(), 65);

    chain
        .bundler()
        .push_result("eth_sendUserOperation", signed.user_op_hash);
    let user_op_hash = client.send(&signed).await.unwrap();
    assert_eq!(user_op_hash, signed.user_op_hash);

    let send = &chain.bundler().requests_for("eth_sendUserOperation")[0];
    let auth = &send.params[0]["eip7702Auth"];
    assert_eq!(auth["nonce"], "0x2");
    assert_eq!(auth["chainId"], "0x2105");
    assert_eq!(
        auth["address"].as_str().unwrap().parse::<Address>().unwrap(),
        address!("0xe6Cae83BdE06E4c305530e199D7217f42808555B")
    );
    // the authorization travels next to the operation, never inside its hash
    assert_eq!(
        send.params[0]["sender"].as_str().unwrap().parse::<Address>().unwrap(),
        key(ANVIL_KEY_1).address()
    );
}

#[tokio::test]
async fn delegated_eoa_sends_no_authorization() {
    let chain = MockChain::new(8453);
    chain.public().push_result("eth_call", uint_word(3));
    chain.public().push_result("eth_getCode", SIMPLE_7702_DESIGNATOR);
    script_bundler_gas(&chain);
    let client = simple_7702_client(&chain);

    let prepared = client
        .prepare(&[transfer()], PrepareOptions::default())
        .await
        .unwrap();

    assert!(prepared.authorization.is_none());
    assert_eq!(prepared.user_op.nonce(), U256::from(3));
    assert_eq!(chain.public().call_count("eth_getTransactionCount"), 0);
    let estimate = &chain.bundler().requests_for("eth_estimateUserOperationGas")[0];
    assert!(estimate.params[0].get("eip7702Auth").is_none());
}

#[tokio::test]
async fn foreign_delegation_is_not_overwritten() {
    let chain = MockChain::new(8453);
    chain.public().push_result("eth_call", uint_word(0));
    chain.public().push_result(
        "eth_getCode",
        format!("0xef0100{}", alloy::hex::encode(Address::repeat_byte(0x42))),
    );
    script_bundler_gas(&chain);
    let client = simple_7702_client(&chain);

    let prepared = client
        .prepare(&[transfer()], PrepareOptions::default())
        .await
        .unwrap();
    assert!(prepared.authorization.is_none());

    let signed = client.sign(prepared).unwrap();
    chain
        .bundler()
        .push_result("eth_sendUserOperation", signed.user_op_hash);
    client.send(&signed).await.unwrap();

    let send = &chain.bundler().requests_for("eth_sendUserOperation")[0];
    assert!(send.params[0].get("eip7702Auth").is_none());
    assert_eq!(chain.public().call_count("eth_getTransactionCount"), 0);
}

#[tokio::test]
async fn send_and_wait_reports_success() {
    setup_tracing();
    let chain = MockChain::new(8453);
    chain.public().push_result("eth_call", uint_word(0));
    chain.public().push_result("eth_getCode", SIMPLE_7702_DESIGNATOR);
    script_bundler_gas(&chain);
    let client = simple_7702_client(&chain);

    let user_op_hash = B256::repeat_byte(0x42);
    let sender = key(ANVIL_KEY_1).address();
    chain
        .bundler()
        .push_result("eth_sendUserOperation", user_op_hash);
    chain
        .bundler()
        .push_result("eth_getUserOperationReceipt", receipt_json(user_op_hash, sender, true));

    let outcome = client
        .send_calls_and_wait(&[transfer(), transfer()], &CancellationToken::new())
        .await
        .unwrap();

    let PollOutcome::Success(receipt) = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(receipt.user_op_hash, user_op_hash);
    assert_eq!(receipt.receipt.block_number, 1_234_567);
}

#[tokio::test]
async fn calls_status_follows_the_receipt() {
    let chain = MockChain::new(8453);
    let client = simple_7702_client(&chain);
    let user_op_hash = B256::repeat_byte(0x42);
    let sender = key(ANVIL_KEY_1).address();

    chain
        .bundler()
        .push_result("eth_getUserOperationReceipt", Value::Null)
        .push_result("eth_getUserOperationReceipt", receipt_json(user_op_hash, sender, true));
    chain.bundler().push_result(
        "pimlico_getUserOperationStatus",
        json!({ "status": "submitted", "transactionHash": null }),
    );

    let pending = client.get_calls_status(user_op_hash).await.unwrap();
    assert_eq!(pending.status, STATUS_PENDING);
    assert_eq!(pending.kind(), Some(CallStatusKind::Pending));
    assert_eq!(pending.id, user_op_hash.to_string());
    assert!(pending.receipts.is_none());

    let confirmed = client.get_calls_status(user_op_hash).await.unwrap();
    assert_eq!(confirmed.status, STATUS_CONFIRMED);
    assert_eq!(confirmed.chain_id, 8453);
    assert!(confirmed.atomic);
    let receipts = confirmed.receipts.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].status, 1);
    assert_eq!(receipts[0].transaction_hash, B256::repeat_byte(0x7a));
    assert_eq!(receipts[0].logs.len(), 1);
    assert_eq!(receipts[0].gas_used, 250_000);
}

#[tokio::test]
async fn calls_status_reports_failures() {
    let chain = MockChain::new(8453);
    let client = simple_7702_client(&chain);
    let user_op_hash = B256::repeat_byte(0x42);
    let sender = key(ANVIL_KEY_1).address();

    chain
        .bundler()
        .push_result("eth_getUserOperationReceipt", Value::Null)
        .push_result("eth_getUserOperationReceipt", receipt_json(user_op_hash, sender, false));
    chain.bundler().push_result(
        "pimlico_getUserOperationStatus",
        json!({ "status": "rejected", "transactionHash": null }),
    );

    let dropped = client.get_calls_status(user_op_hash).await.unwrap();
    assert_eq!(dropped.status, STATUS_OFFCHAIN_FAILURE);
    assert_eq!(dropped.kind(), Some(CallStatusKind::Failure));

    let reverted = client.get_calls_status(user_op_hash).await.unwrap();
    assert_eq!(reverted.status, STATUS_REVERTED);
    assert_eq!(reverted.receipts.unwrap()[0].status, 0);
}

#[tokio::test]
async fn sponsored_v06_operation_carries_paymaster_data() {
    let chain = MockChain::new(1).with_paymaster();
    chain
        .public()
        .push_result("eth_call", address_word(SENDER))
        .push_result("eth_call", uint_word(0));
    chain.public().push_result("eth_getCode", "0x6080");
    script_bundler_gas(&chain);
    let paymaster = chain.paymaster().unwrap();
    paymaster.push_result(
        "pm_sponsorUserOperation",
        json!({
            "paymasterAndData": "0x11111111111111111111111111111111111111110102",
            "callGasLimit": "0x7530",
            "verificationGasLimit": "0x186a0",
            "preVerificationGas": "0xafc8"
        }),
    );

    let account = SimpleAccount::new(key(ANVIL_KEY_0), 1, EntryPointVersion::V0_6).unwrap();
    let client = SmartAccountClient::new(chain.clone(), AccountHandle::new(account))
        .unwrap()
        .with_sponsorship(Sponsorship {
            context: Some(json!({ "sponsorshipPolicyId": "sp_cool" })),
        });

    let prepared = client
        .prepare(&[transfer()], PrepareOptions::default())
        .await
        .unwrap();

    let VersionedUserOp::V0_6(op) = &prepared.user_op else {
        panic!("expected a v0.6 operation");
    };
    assert_eq!(op.paymaster_and_data.len(), 22);
    assert!(op.init_code.is_empty());
    assert_eq!(op.call_gas_limit, U256::from(30_000));
    assert_eq!(op.verification_gas_limit, U256::from(100_000));
    assert_eq!(op.pre_verification_gas, U256::from(45_000));
    assert_eq!(chain.bundler().call_count("eth_estimateUserOperationGas"), 0);

    let request = &paymaster.requests_for("pm_sponsorUserOperation")[0];
    assert_eq!(request.params[2]["sponsorshipPolicyId"], "sp_cool");
}

#[tokio::test]
async fn configured_multipliers_scale_estimates() {
    let config = EngineConfig::from_yaml(
        r#"
gas:
  call_gas_percent: 120
  verification_gas_percent: 110
polling:
  interval_ms: 500
  max_interval_ms: 500
  timeout_ms: 10000
"#,
    )
    .unwrap();

    let chain = MockChain::new(8453);
    chain.public().push_result("eth_call", uint_word(0));
    chain.public().push_result("eth_getCode", SIMPLE_7702_DESIGNATOR);
    script_bundler_gas(&chain);
    let account = Simple7702Account::new(key(ANVIL_KEY_1), 8453).unwrap();
    let client =
        SmartAccountClient::from_config(chain.clone(), AccountHandle::new(account), &config)
            .unwrap();

    let prepared = client
        .prepare(&[transfer()], PrepareOptions::default())
        .await
        .unwrap();

    assert_eq!(
        prepared.user_op.gas_limits(),
        (U256::from(220_000), U256::from(120_000), U256::from(50_000))
    );
    assert_eq!(
        client.poll_policy().timeout,
        std::time::Duration::from_secs(10)
    );
}

#[tokio::test]
async fn bundler_rejections_keep_their_payload() {
    let chain = MockChain::new(8453);
    chain.public().push_result("eth_call", uint_word(0));
    chain.public().push_result("eth_getCode", SIMPLE_7702_DESIGNATOR);
    chain.bundler().push_result(
        "pimlico_getUserOperationGasPrice",
        json!({ "maxFeePerGas": "0x10", "maxPriorityFeePerGas": "0x1" }),
    );
    chain.bundler().push_error(
        "eth_estimateUserOperationGas",
        -32500,
        "AA21 didn't pay prefund",
        Some(json!({ "reason": "AA21" })),
    );
    let client = simple_7702_client(&chain);

    let error = client
        .prepare(&[transfer()], PrepareOptions::default())
        .await
        .unwrap_err();

    let EngineError::BundlerError { kind, .. } = &error else {
        panic!("expected a bundler error, got {error:?}");
    };
    let response = kind.error_response().unwrap();
    assert_eq!(response.code, -32500);
    assert_eq!(response.message, "AA21 didn't pay prefund");
    assert!(response.data.as_deref().unwrap().contains("AA21"));
}
