//! # Registers
//!
//! Register argument area of a call context
//!
//! System V gives integer and floating-point arguments their own register sequences. Microsoft
//! x64 assigns registers by argument position instead: the Nth argument goes to the Nth integer
//! register or the Nth vector register depending on its class, so both classes share one set of
//! slots and one counter.

use crate::mode::Platform;

/// Integer registers available for System V arguments (rdi, rsi, rdx, rcx, r8, r9)
pub const SYSV_INT_REGS: usize = 6;
/// Vector registers available for System V arguments (xmm0-xmm7)
pub const SYSV_FLOAT_REGS: usize = 8;
/// Argument positions passed in registers on Microsoft x64 (rcx/xmm0 .. r9/xmm3)
pub const WIN64_REGS: usize = 4;
/// Width of one register slot in bytes
pub const SLOT_SIZE: usize = 8;

/// Register slots for System V
#[derive(Debug, Clone, Default)]
pub struct SysVRegisters {
    /// Integer class slots, in rdi, rsi, rdx, rcx, r8, r9 order
    ints: [u64; SYSV_INT_REGS],
    /// Floating-point class slots as raw bits, in xmm0-xmm7 order
    floats: [u64; SYSV_FLOAT_REGS],
    /// Filled integer slots
    int_count: usize,
    /// Filled floating-point slots
    float_count: usize,
}

/// Positional register slots for Microsoft x64
#[derive(Debug, Clone, Default)]
pub struct Win64Registers {
    /// Slot N is loaded into both the Nth integer and the Nth vector register
    slots: [u64; WIN64_REGS],
    /// Filled slots, shared by both classes
    count: usize,
}

/// Register argument area, one variant per register assignment scheme
#[derive(Debug, Clone)]
pub enum RegisterData {
    /// Separate integer and floating-point sequences
    SysV(SysVRegisters),
    /// One positional sequence shared by both classes
    Win64(Win64Registers),
}

impl RegisterData {
    /// Creates an empty register area for the given platform
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Unix => Self::SysV(SysVRegisters::default()),
            Platform::Windows => Self::Win64(Win64Registers::default()),
        }
    }

    /// Number of bytes the register slots take up for the given platform
    ///
    /// This is the part of a context's size budget that is not available to the stack buffer.
    pub const fn area_size(platform: Platform) -> usize {
        match platform {
            Platform::Unix => (SYSV_INT_REGS + SYSV_FLOAT_REGS) * SLOT_SIZE,
            Platform::Windows => WIN64_REGS * SLOT_SIZE,
        }
    }

    /// Empties every slot counter
    pub fn reset(&mut self) {
        match self {
            Self::SysV(regs) => {
                regs.int_count = 0;
                regs.float_count = 0;
            }
            Self::Win64(regs) => regs.count = 0,
        }
    }

    /// Places an integer class word in the next free slot.
    ///
    /// Returns `false` if the integer registers are exhausted and the value has to go to the stack.
    pub fn push_int(&mut self, value: u64) -> bool {
        match self {
            Self::SysV(regs) => push_slot(&mut regs.ints, &mut regs.int_count, value),
            Self::Win64(regs) => push_slot(&mut regs.slots, &mut regs.count, value),
        }
    }

    /// Places the raw bits of a floating-point value in the next free slot.
    ///
    /// Returns `false` if the floating-point registers are exhausted.
    pub fn push_float(&mut self, bits: u64) -> bool {
        match self {
            Self::SysV(regs) => push_slot(&mut regs.floats, &mut regs.float_count, bits),
            Self::Win64(regs) => push_slot(&mut regs.slots, &mut regs.count, bits),
        }
    }

    /// Filled integer slots
    pub fn int_count(&self) -> usize {
        match self {
            Self::SysV(regs) => regs.int_count,
            Self::Win64(regs) => regs.count,
        }
    }

    /// Filled floating-point slots
    pub fn float_count(&self) -> usize {
        match self {
            Self::SysV(regs) => regs.float_count,
            Self::Win64(regs) => regs.count,
        }
    }

    /// Integer slots still free
    pub fn int_remaining(&self) -> usize {
        self.int_slots().len() - self.int_count()
    }

    /// Floating-point slots still free
    pub fn float_remaining(&self) -> usize {
        self.float_slots().len() - self.float_count()
    }

    /// All integer slots, including the ones not filled by the current call
    pub fn int_slots(&self) -> &[u64] {
        match self {
            Self::SysV(regs) => &regs.ints,
            Self::Win64(regs) => &regs.slots,
        }
    }

    /// All floating-point slots as raw bits, including the ones not filled by the current call
    pub fn float_slots(&self) -> &[u64] {
        match self {
            Self::SysV(regs) => &regs.floats,
            Self::Win64(regs) => &regs.slots,
        }
    }
}

/// Writes `value` to `slots[*count]` if there is room, bumping the count
fn push_slot(slots: &mut [u64], count: &mut usize, value: u64) -> bool {
    match slots.get_mut(*count) {
        Some(slot) => {
            *slot = value;
            *count += 1;
            true
        }
        None => false,
    }
}
