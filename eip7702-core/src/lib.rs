pub mod constants;
pub mod delegated_account;

pub use delegated_account::{DelegatedAccount, delegation_target, is_delegation_designator};
