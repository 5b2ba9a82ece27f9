//! # General
//!
//! Backend for ordinary C functions, including variadic ones

use std::ffi::c_void;
use std::mem;

use log::trace;

use super::{Backend, BackendKind};
use crate::aggregate::classify::{
    StructClassifier, SysVClassifier, Win64Classifier, MAX_UNROLL_SIZE,
};
use crate::aggregate::StructLayout;
use crate::code::{RawReturn, Trampolines};
use crate::error::CallVmError;
use crate::vm::registers::{RegisterData, SLOT_SIZE};
use crate::vm::CallState;

// a spilled float is widened to exactly one stack slot
const _: () = assert!(mem::size_of::<f64>() == SLOT_SIZE);

/// Register-or-stack placement for C calls
///
/// Arguments fill registers of their class in order; once a class runs out, the rest of that class
/// is appended to the stack buffer. Struct arguments always get a stack copy and are additionally
/// offered to the classifier when small enough.
pub struct GeneralBackend {
    /// Kind reported for this instance
    kind: BackendKind,
    /// Maps small aggregates onto registers
    classifier: &'static dyn StructClassifier,
}

impl GeneralBackend {
    /// System V flavour
    pub const SYSV: Self = Self {
        kind: BackendKind::GeneralSysV,
        classifier: &SysVClassifier,
    };
    /// Microsoft x64 flavour
    pub const WIN64: Self = Self {
        kind: BackendKind::GeneralWin64,
        classifier: &Win64Classifier,
    };
}

impl Backend for GeneralBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn arg_long_long(&self, state: &mut CallState, value: i64) {
        if !state.registers.push_int(value as u64) {
            trace!("integer registers exhausted, spilling to stack");
            state.stack.append(&value.to_le_bytes());
        }
    }

    fn arg_float(&self, state: &mut CallState, value: f32) {
        let bits = value.to_bits() as u64;
        if !state.registers.push_float(bits) {
            trace!("float registers exhausted, spilling to stack");
            // floats still take a full double sized slot on the stack, the upper half zeroed
            state.stack.append(&bits.to_le_bytes());
        }
    }

    fn arg_double(&self, state: &mut CallState, value: f64) {
        let bits = value.to_bits();
        if !state.registers.push_float(bits) {
            trace!("float registers exhausted, spilling to stack");
            state.stack.append(&bits.to_le_bytes());
        }
    }

    fn arg_pointer(&self, state: &mut CallState, value: *const c_void) {
        let word = value as usize as u64;
        if !state.registers.push_int(word) {
            trace!("integer registers exhausted, spilling to stack");
            state.stack.append(&word.to_le_bytes());
        }
    }

    fn arg_struct(
        &self,
        state: &mut CallState,
        layout: &StructLayout,
        data: &[u8],
    ) -> Result<(), CallVmError> {
        assert_eq!(
            data.len(),
            layout.size(),
            "struct data does not match its layout"
        );

        state.stack.append(data);
        if layout.size() <= MAX_UNROLL_SIZE {
            self.classifier.classify(&mut state.registers, layout, data);
        }
        Ok(())
    }

    unsafe fn invoke(
        &self,
        state: &CallState,
        trampolines: &Trampolines,
        target: *const c_void,
    ) -> RawReturn {
        let mut ret = RawReturn::default();
        let stack = &state.stack;
        match &state.registers {
            RegisterData::SysV(_) => (trampolines.sysv())(
                stack.len(),
                stack.as_ptr(),
                state.registers.int_slots().as_ptr(),
                state.registers.float_slots().as_ptr(),
                target,
                &mut ret,
            ),
            RegisterData::Win64(_) => (trampolines.win64())(
                stack.len(),
                stack.as_ptr(),
                state.registers.int_slots().as_ptr(),
                target,
                &mut ret,
            ),
        }
        ret
    }
}
