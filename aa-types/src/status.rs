//! ERC-5792 batch-call status objects.

use alloy::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

pub const CALLS_STATUS_VERSION: &str = "2.0.0";

pub const STATUS_PENDING: u16 = 100;
pub const STATUS_CONFIRMED: u16 = 200;
pub const STATUS_OFFCHAIN_FAILURE: u16 = 400;
pub const STATUS_REVERTED: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatusKind {
    Pending,
    Success,
    Failure,
}

impl CallStatusKind {
    /// Bucket a numeric status code. Codes below 100 are not defined.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0..=99 => None,
            100..=199 => Some(CallStatusKind::Pending),
            200..=299 => Some(CallStatusKind::Success),
            _ => Some(CallStatusKind::Failure),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, CallStatusKind::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLog {
    pub address: Address,
    pub data: Bytes,
    pub topics: Vec<B256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallReceipt {
    /// `1` on success, `0` on revert.
    #[serde(with = "alloy::serde::quantity")]
    pub status: u64,
    pub logs: Vec<CallLog>,
    pub block_hash: B256,
    #[serde(with = "alloy::serde::quantity")]
    pub block_number: u64,
    #[serde(with = "alloy::serde::quantity")]
    pub gas_used: u64,
    pub transaction_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsStatus {
    pub version: String,
    pub id: String,
    #[serde(with = "alloy::serde::quantity")]
    pub chain_id: u64,
    pub status: u16,
    pub atomic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipts: Option<Vec<CallReceipt>>,
}

impl CallsStatus {
    pub fn pending(id: impl Into<String>, chain_id: u64) -> Self {
        CallsStatus {
            version: CALLS_STATUS_VERSION.to_string(),
            id: id.into(),
            chain_id,
            status: STATUS_PENDING,
            atomic: true,
            receipts: None,
        }
    }

    pub fn kind(&self) -> Option<CallStatusKind> {
        CallStatusKind::from_code(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_status_codes() {
        assert_eq!(CallStatusKind::from_code(100), Some(CallStatusKind::Pending));
        assert_eq!(CallStatusKind::from_code(199), Some(CallStatusKind::Pending));
        assert_eq!(CallStatusKind::from_code(200), Some(CallStatusKind::Success));
        assert_eq!(CallStatusKind::from_code(299), Some(CallStatusKind::Success));
        assert_eq!(CallStatusKind::from_code(300), Some(CallStatusKind::Failure));
        assert_eq!(CallStatusKind::from_code(600), Some(CallStatusKind::Failure));
        assert_eq!(CallStatusKind::from_code(42), None);
    }

    #[test]
    fn serializes_quantities_as_hex() {
        let status = CallsStatus {
            receipts: Some(vec![CallReceipt {
                status: 1,
                logs: vec![],
                block_hash: B256::repeat_byte(0x11),
                block_number: 16,
                gas_used: 21_000,
                transaction_hash: B256::repeat_byte(0x22),
            }]),
            status: STATUS_CONFIRMED,
            ..CallsStatus::pending("0xabc", 8453)
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["chainId"], "0x2105");
        assert_eq!(json["status"], 200);
        assert_eq!(json["receipts"][0]["gasUsed"], "0x5208");
        assert_eq!(json["receipts"][0]["status"], "0x1");

        let back: CallsStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);
        assert_eq!(back.kind(), Some(CallStatusKind::Success));
    }
}
