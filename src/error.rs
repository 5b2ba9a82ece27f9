//! # Error
//!
//! Errors reported by call contexts and the trampolines behind them

use iced_x86::IcedError;
use thiserror::Error;

use crate::mode::{CallMode, Platform};

/// Errors raised while configuring a [`CallVm`](crate::vm::CallVm)
///
/// Pushing arguments and invoking never fail once a context exists; everything here
/// happens at configuration time.
#[derive(Debug, Clone, Error)]
pub enum CallVmError {
    /// The requested calling convention is not implemented on this platform
    #[error("calling convention {mode:?} is not supported on {platform:?}")]
    UnsupportedMode {
        /// Mode that was requested
        mode: CallMode,
        /// Platform the context was configured for
        platform: Platform,
    },
    /// The raw mode identifier does not name any known calling convention
    #[error("unknown calling convention identifier {0}")]
    UnknownMode(i32),
    /// The active backend has no way of passing aggregates
    #[error("struct arguments are not supported by the active calling convention")]
    StructUnsupported,
    /// The call trampolines could not be generated for this process
    #[error("call trampolines are unavailable: {0}")]
    Trampoline(&'static TrampolineError),
}

impl CallVmError {
    /// Returns `true` if this error is one of the unsupported-mode conditions
    pub fn is_unsupported_mode(&self) -> bool {
        matches!(self, Self::UnsupportedMode { .. } | Self::UnknownMode(_))
    }
}

/// Errors while assembling trampolines and moving them into executable memory
#[derive(Debug, Error)]
pub enum TrampolineError {
    /// Error while assembling the trampoline code
    #[error("{0}")]
    Assembler(#[from] IcedError),
    /// Error while memmapping a region for the trampolines
    #[error("{0}")]
    Map(mmap::MapError),
    /// Error while changing the protection of the trampoline region
    #[error("Error setting memory protections")]
    Protection(#[from] region::Error),
}
