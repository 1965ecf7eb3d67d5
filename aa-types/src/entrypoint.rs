use alloy::primitives::{Address, address};
use serde::{Deserialize, Serialize};

pub const ENTRYPOINT_ADDRESS_V0_6: Address =
    address!("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

pub const ENTRYPOINT_ADDRESS_V0_7: Address =
    address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032");

pub const ENTRYPOINT_ADDRESS_V0_8: Address =
    address!("0x4337084D9E255Ff0702461CF8895CE9E3b5Ff108");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryPointVersion {
    #[serde(rename = "0.6")]
    V0_6,
    #[serde(rename = "0.7")]
    V0_7,
    #[serde(rename = "0.8")]
    V0_8,
}

impl EntryPointVersion {
    /// v0.7 and later use the packed user operation shape.
    pub fn is_packed(self) -> bool {
        !matches!(self, EntryPointVersion::V0_6)
    }

    pub fn default_address(self) -> Address {
        match self {
            EntryPointVersion::V0_6 => ENTRYPOINT_ADDRESS_V0_6,
            EntryPointVersion::V0_7 => ENTRYPOINT_ADDRESS_V0_7,
            EntryPointVersion::V0_8 => ENTRYPOINT_ADDRESS_V0_8,
        }
    }

    pub fn from_address(address: Address) -> Option<Self> {
        [
            EntryPointVersion::V0_6,
            EntryPointVersion::V0_7,
            EntryPointVersion::V0_8,
        ]
        .into_iter()
        .find(|version| version.default_address() == address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub address: Address,
    pub version: EntryPointVersion,
}

impl EntryPoint {
    pub const V0_6: EntryPoint = EntryPoint {
        address: ENTRYPOINT_ADDRESS_V0_6,
        version: EntryPointVersion::V0_6,
    };

    pub const V0_7: EntryPoint = EntryPoint {
        address: ENTRYPOINT_ADDRESS_V0_7,
        version: EntryPointVersion::V0_7,
    };

    pub const V0_8: EntryPoint = EntryPoint {
        address: ENTRYPOINT_ADDRESS_V0_8,
        version: EntryPointVersion::V0_8,
    };

    pub fn canonical(version: EntryPointVersion) -> Self {
        EntryPoint {
            address: version.default_address(),
            version,
        }
    }
}
