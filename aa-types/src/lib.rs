pub mod address;
pub mod codec;
pub mod entrypoint;
pub mod status;
pub mod userop;

pub use entrypoint::{EntryPoint, EntryPointVersion};
pub use userop::{UserOpError, VersionedUserOp};
