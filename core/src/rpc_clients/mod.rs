mod bundler;
mod paymaster;
mod public;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use bundler::*;
pub use paymaster::*;
pub use public::*;
