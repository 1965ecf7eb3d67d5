use alloy::primitives::{Address, address};

/// EIP-7702 delegation prefix bytes
pub const EIP_7702_DELEGATION_PREFIX: [u8; 3] = [0xef, 0x01, 0x00];

/// EIP-7702 delegation code length (prefix + address)
pub const EIP_7702_DELEGATION_CODE_LENGTH: usize = 23;

/// eth-infinitism `Simple7702Account`, validated by EntryPoint v0.8.
pub const SIMPLE_7702_DELEGATE: Address = address!("0xe6Cae83BdE06E4c305530e199D7217f42808555B");

/// Kernel v0.3.3 implementation used as a 7702 delegate.
pub const KERNEL_V3_3_DELEGATE: Address = address!("0xd6CEDDe84be40893d153Be9d467CD6aD37875b28");
