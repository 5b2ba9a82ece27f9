//! # Syscall
//!
//! Backend for raw Linux x64 system calls
//!
//! System call arguments are all integer class, at most six of them, and never touch the stack.
//! The call target is the system call number.

use std::ffi::c_void;

use super::{Backend, BackendKind};
use crate::aggregate::StructLayout;
use crate::code::{RawReturn, Trampolines};
use crate::error::CallVmError;
use crate::vm::registers::SYSV_INT_REGS;
use crate::vm::CallState;

/// Most arguments any system call takes
pub const SYSCALL_MAX_ARGS: usize = 6;

// the syscall trampoline reads its arguments straight from the integer slots
const _: () = assert!(SYSV_INT_REGS >= SYSCALL_MAX_ARGS);

/// Places every argument in the next integer slot
pub struct SyscallBackend;

impl SyscallBackend {
    /// Stores one argument word
    fn push(&self, state: &mut CallState, word: u64) {
        assert!(
            state.registers.int_count() < SYSCALL_MAX_ARGS && state.registers.push_int(word),
            "system calls take at most {SYSCALL_MAX_ARGS} arguments"
        );
    }
}

impl Backend for SyscallBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SyscallSysV
    }

    fn arg_long_long(&self, state: &mut CallState, value: i64) {
        self.push(state, value as u64);
    }

    fn arg_float(&self, state: &mut CallState, value: f32) {
        self.push(state, value.to_bits() as u64);
    }

    fn arg_double(&self, state: &mut CallState, value: f64) {
        self.push(state, value.to_bits());
    }

    fn arg_pointer(&self, state: &mut CallState, value: *const c_void) {
        self.push(state, value as usize as u64);
    }

    fn arg_struct(
        &self,
        _state: &mut CallState,
        _layout: &StructLayout,
        _data: &[u8],
    ) -> Result<(), CallVmError> {
        Err(CallVmError::StructUnsupported)
    }

    unsafe fn invoke(
        &self,
        state: &CallState,
        trampolines: &Trampolines,
        target: *const c_void,
    ) -> RawReturn {
        let mut ret = RawReturn::default();
        (trampolines.syscall())(state.registers.int_slots().as_ptr(), target, &mut ret);
        ret
    }
}
