//! ERC-7579 `execute(bytes32 mode, bytes executionCalldata)`.

use aakit_core::call::Call;
use alloy::{
    primitives::{B256, Bytes},
    sol,
    sol_types::{SolCall, SolValue},
};

pub const CALLTYPE_SINGLE: u8 = 0x00;
pub const CALLTYPE_BATCH: u8 = 0x01;
pub const EXECTYPE_DEFAULT: u8 = 0x00;

sol! {
    struct Execution {
        address target;
        uint256 value;
        bytes callData;
    }

    function execute(bytes32 mode, bytes executionCalldata);
}

/// `callType(1) ‖ execType(1) ‖ unused(4) ‖ selector(4) ‖ payload(22)`; only
/// the first two bytes are set here.
pub fn execution_mode(call_type: u8, exec_type: u8) -> B256 {
    let mut mode = B256::ZERO;
    mode[0] = call_type;
    mode[1] = exec_type;
    mode
}

/// Single execution calldata is packed: `target(20) ‖ value(32) ‖ callData`.
pub fn encode_single(call: &Call) -> Bytes {
    let execution = [
        call.to.as_slice(),
        &call.value.to_be_bytes::<32>(),
        call.data.as_ref(),
    ]
    .concat();

    executeCall {
        mode: execution_mode(CALLTYPE_SINGLE, EXECTYPE_DEFAULT),
        executionCalldata: execution.into(),
    }
    .abi_encode()
    .into()
}

/// Batch execution calldata is `abi.encode(Execution[])`.
pub fn encode_batch(calls: &[Call]) -> Bytes {
    let executions: Vec<Execution> = calls
        .iter()
        .map(|call| Execution {
            target: call.to,
            value: call.value,
            callData: call.data.clone(),
        })
        .collect();

    executeCall {
        mode: execution_mode(CALLTYPE_BATCH, EXECTYPE_DEFAULT),
        executionCalldata: executions.abi_encode().into(),
    }
    .abi_encode()
    .into()
}
