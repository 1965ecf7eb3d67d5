pub mod account_factory;
pub mod accounts;
pub mod client;
pub mod smart_account;
pub mod userop;
pub mod webauthn;

pub use client::SmartAccountClient;
pub use smart_account::{AccountHandle, AccountKind, SmartAccount};
