pub mod call;
pub mod chain;
pub mod config;
pub mod error;
pub mod owner;
pub mod rpc_clients;
