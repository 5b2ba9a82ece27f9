//! # Backend
//!
//! Calling convention backends and the mode selector that picks one
//!
//! A backend decides where each argument goes and which trampoline performs the call. Backends are
//! stateless `static`s shared by every context; all per-call state lives in [`CallState`].

use std::ffi::{c_char, c_int, c_long, c_short, c_void};

use log::warn;

use crate::aggregate::StructLayout;
use crate::code::{RawReturn, Trampolines};
use crate::error::CallVmError;
use crate::mode::{CallMode, Platform};
use crate::vm::CallState;

pub mod general;
pub mod syscall;

/// General purpose System V backend
pub static GENERAL_SYSV: general::GeneralBackend = general::GeneralBackend::SYSV;
/// General purpose Microsoft x64 backend
pub static GENERAL_WIN64: general::GeneralBackend = general::GeneralBackend::WIN64;
/// Linux `syscall` backend
pub static SYSCALL_SYSV: syscall::SyscallBackend = syscall::SyscallBackend;

/// Identifies a backend without comparing trait objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// [`GENERAL_SYSV`]
    GeneralSysV,
    /// [`GENERAL_WIN64`]
    GeneralWin64,
    /// [`SYSCALL_SYSV`]
    SyscallSysV,
}

/// Argument placement and call dispatch for one calling convention
///
/// The integer family (`bool` up to `long long`) is widened to a full 64 bit word and funneled
/// through [`arg_long_long`](Backend::arg_long_long).
pub trait Backend: Sync {
    /// Which backend this is
    fn kind(&self) -> BackendKind;

    /// Pushes a 64 bit integer class argument
    fn arg_long_long(&self, state: &mut CallState, value: i64);

    /// Pushes a `float`
    fn arg_float(&self, state: &mut CallState, value: f32);

    /// Pushes a `double`
    fn arg_double(&self, state: &mut CallState, value: f64);

    /// Pushes a pointer
    fn arg_pointer(&self, state: &mut CallState, value: *const c_void);

    /// Pushes a struct by value
    ///
    /// `data` holds exactly `layout.size()` bytes.
    fn arg_struct(
        &self,
        state: &mut CallState,
        layout: &StructLayout,
        data: &[u8],
    ) -> Result<(), CallVmError>;

    /// Calls `target` with the arguments in `state`
    ///
    /// # Safety
    ///
    /// `target` must be callable under this backend's convention with the pushed arguments
    unsafe fn invoke(
        &self,
        state: &CallState,
        trampolines: &Trampolines,
        target: *const c_void,
    ) -> RawReturn;

    /// Pushes a `bool` as 0 or 1
    fn arg_bool(&self, state: &mut CallState, value: bool) {
        self.arg_long_long(state, value as i64);
    }

    /// Pushes a `char`, sign extended
    fn arg_char(&self, state: &mut CallState, value: c_char) {
        self.arg_long_long(state, value as i64);
    }

    /// Pushes a `short`, sign extended
    fn arg_short(&self, state: &mut CallState, value: c_short) {
        self.arg_long_long(state, value as i64);
    }

    /// Pushes an `int`, sign extended
    fn arg_int(&self, state: &mut CallState, value: c_int) {
        self.arg_long_long(state, value as i64);
    }

    /// Pushes a `long`, sign extended
    fn arg_long(&self, state: &mut CallState, value: c_long) {
        self.arg_long_long(state, value as i64);
    }

    /// Clears all pushed arguments
    fn reset(&self, state: &mut CallState) {
        state.registers.reset();
        state.stack.reset();
    }
}

/// Resolves a calling convention to the backend implementing it on `platform`
pub fn select(mode: CallMode, platform: Platform) -> Result<&'static dyn Backend, CallVmError> {
    let general: &'static dyn Backend = match platform {
        Platform::Unix => &GENERAL_SYSV,
        Platform::Windows => &GENERAL_WIN64,
    };

    match (platform, mode) {
        (_, CallMode::CDefault | CallMode::CEllipsis | CallMode::CEllipsisVarargs) => Ok(general),
        (Platform::Unix, CallMode::CX64SysV) | (Platform::Windows, CallMode::CX64Win64) => {
            Ok(general)
        }
        (Platform::Unix, CallMode::SysDefault | CallMode::SysX64SyscallSysV) => Ok(&SYSCALL_SYSV),
        _ => {
            warn!("calling convention {mode:?} is not supported on {platform:?}");
            Err(CallVmError::UnsupportedMode { mode, platform })
        }
    }
}
