//! # Code
//!
//! Machine code generated at runtime to perform the actual calls
//!
//! The trampolines are assembled once per process, the first time a call context is created, and
//! live until the process exits.

use std::ffi::c_void;
use std::mem;

use iced_x86::code_asm::CodeAssembler;
use iced_x86::IcedError;
use lazy_static::lazy_static;
use log::debug;

use crate::alloc::ExecutableMemory;
use crate::error::{CallVmError, TrampolineError};

pub mod x64;

/// Generates the code for one trampoline
///
/// # Safety
///
/// The generated code must follow the entry signature documented on the implementor exactly, and
/// must preserve every register the System V convention marks as callee-saved.
pub unsafe trait TrampolineGenerator {
    /// Appends the trampoline's instructions to `a`
    fn generate(a: &mut CodeAssembler) -> Result<(), IcedError>;
}

/// Assembles a trampoline into position independent bytes
pub fn assemble<G: TrampolineGenerator>() -> Result<Vec<u8>, IcedError> {
    let mut a = CodeAssembler::new(64)?;
    G::generate(&mut a)?;
    // nothing is ip relative, so the bytes run anywhere
    a.assemble(0)
}

/// Raw register state captured right after the target returned
///
/// Which of these holds the result depends on the target's declared return type, which only the
/// caller knows: integers and pointers come back in `rax` (and `rdx` for 128 bit values), floating
/// point values in the low bits of `xmm0` (and `xmm1`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawReturn {
    /// rax
    rax: u64,
    /// rdx
    rdx: u64,
    /// Low 64 bits of xmm0
    xmm0: u64,
    /// Low 64 bits of xmm1
    xmm1: u64,
}

impl RawReturn {
    /// Value of rax
    pub fn rax(&self) -> u64 {
        self.rax
    }

    /// Value of rdx
    pub fn rdx(&self) -> u64 {
        self.rdx
    }

    /// Low 64 bits of xmm0
    pub fn xmm0(&self) -> u64 {
        self.xmm0
    }

    /// Low 64 bits of xmm1
    pub fn xmm1(&self) -> u64 {
        self.xmm1
    }

    /// xmm0 read as a `double`
    pub fn as_f64(&self) -> f64 {
        f64::from_bits(self.xmm0)
    }

    /// xmm0 read as a `float`
    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.xmm0 as u32)
    }

    /// rax read as a pointer
    pub fn as_ptr(&self) -> *mut c_void {
        self.rax as usize as *mut c_void
    }
}

/// Entry point of [`x64::SysVTrampoline`]
pub type SysVCall = unsafe extern "sysv64" fn(
    usize,
    *const u8,
    *const u64,
    *const u64,
    *const c_void,
    *mut RawReturn,
);
/// Entry point of [`x64::Win64Trampoline`]
pub type Win64Call =
    unsafe extern "sysv64" fn(usize, *const u8, *const u64, *const c_void, *mut RawReturn);
/// Entry point of [`x64::SyscallTrampoline`]
pub type SyscallCall = unsafe extern "sysv64" fn(*const u64, *const c_void, *mut RawReturn);

/// All trampolines of the process
pub struct Trampolines {
    /// See [`x64::SysVTrampoline`]
    sysv: ExecutableMemory,
    /// See [`x64::Win64Trampoline`]
    win64: ExecutableMemory,
    /// See [`x64::SyscallTrampoline`]
    syscall: ExecutableMemory,
}

impl Trampolines {
    /// Assembles every trampoline and maps it executable
    fn build() -> Result<Self, TrampolineError> {
        let trampolines = Self {
            sysv: ExecutableMemory::new(&assemble::<x64::SysVTrampoline>()?)?,
            win64: ExecutableMemory::new(&assemble::<x64::Win64Trampoline>()?)?,
            syscall: ExecutableMemory::new(&assemble::<x64::SyscallTrampoline>()?)?,
        };
        debug!(
            "generated trampolines: sysv at {:p}, win64 at {:p}, syscall at {:p}",
            trampolines.sysv.as_ptr(),
            trampolines.win64.as_ptr(),
            trampolines.syscall.as_ptr()
        );
        Ok(trampolines)
    }

    /// System V call trampoline
    pub fn sysv(&self) -> SysVCall {
        // Safety: the region holds the code of `SysVTrampoline`, whose entry signature is `SysVCall`
        unsafe { mem::transmute::<*const u8, SysVCall>(self.sysv.as_ptr()) }
    }

    /// Microsoft x64 call trampoline
    pub fn win64(&self) -> Win64Call {
        // Safety: the region holds the code of `Win64Trampoline`, whose entry signature is `Win64Call`
        unsafe { mem::transmute::<*const u8, Win64Call>(self.win64.as_ptr()) }
    }

    /// Syscall trampoline
    pub fn syscall(&self) -> SyscallCall {
        // Safety: the region holds the code of `SyscallTrampoline`, whose entry signature is `SyscallCall`
        unsafe { mem::transmute::<*const u8, SyscallCall>(self.syscall.as_ptr()) }
    }
}

lazy_static! {
    static ref TRAMPOLINES: Result<Trampolines, TrampolineError> = Trampolines::build();
}

/// Returns the process-wide trampolines, generating them on first use
pub fn trampolines() -> Result<&'static Trampolines, CallVmError> {
    TRAMPOLINES.as_ref().map_err(CallVmError::Trampoline)
}
