//! Validator-scoped EntryPoint nonce keys (the upper 192 bits of the nonce).

use alloy::primitives::{Address, aliases::U192};

/// Kernel v0.3 validation mode.
pub const KERNEL_MODE_DEFAULT: u8 = 0x00;

/// Kernel v0.3 validation type.
pub const KERNEL_TYPE_VALIDATOR: u8 = 0x01;

/// Nexus validation mode.
pub const NEXUS_MODE_VALIDATION: u8 = 0x00;

/// Kernel v0.3: `mode(1) ‖ type(1) ‖ validator(20) ‖ salt(2)`.
pub fn kernel_nonce_key(mode: u8, validator_type: u8, validator: Address, salt: u16) -> U192 {
    let mut key = [0u8; 24];
    key[0] = mode;
    key[1] = validator_type;
    key[2..22].copy_from_slice(validator.as_slice());
    key[22..].copy_from_slice(&salt.to_be_bytes());
    U192::from_be_bytes(key)
}

/// Nexus: `key(3) ‖ mode(1) ‖ validator(20)`.
pub fn nexus_nonce_key(key: [u8; 3], mode: u8, validator: Address) -> U192 {
    let mut packed = [0u8; 24];
    packed[..3].copy_from_slice(&key);
    packed[3] = mode;
    packed[4..].copy_from_slice(validator.as_slice());
    U192::from_be_bytes(packed)
}

/// Etherspot modular wallet: `validator(20) ‖ 0(4)`.
pub fn etherspot_nonce_key(validator: Address) -> U192 {
    let mut packed = [0u8; 24];
    packed[..20].copy_from_slice(validator.as_slice());
    U192::from_be_bytes(packed)
}
