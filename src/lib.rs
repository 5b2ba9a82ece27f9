#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::missing_crate_level_docs)]
#![doc = include_str!("../README.md")]

#[cfg(not(target_arch = "x86_64"))]
compile_error!("callvm only implements the x86-64 calling conventions");

pub mod aggregate;
pub mod alloc;
pub mod backend;
pub mod code;
pub mod error;
pub mod mode;
pub mod vm;

pub use code::RawReturn;
pub use error::CallVmError;
pub use mode::{CallMode, Platform};
pub use vm::CallVm;
