//! # x64
//!
//! Trampolines that load a prepared argument area into registers and stack, then call the target
//!
//! Every trampoline is entered with the System V convention, whatever the host, so the code
//! reads its own parameters the same way everywhere. What differs is how the target is called.
//! Each one ends by storing rax, rdx and the low halves of xmm0/xmm1 into the caller supplied
//! [`RawReturn`](crate::code::RawReturn) block.

use iced_x86::code_asm::*;
use iced_x86::IcedError;

use super::TrampolineGenerator;
use crate::vm::registers::{SYSV_FLOAT_REGS, SYSV_INT_REGS, WIN64_REGS};

/// Bytes the Microsoft x64 convention reserves above the return address for the callee
const SHADOW_SPACE: i32 = 32;

/// Reserves `rdi` bytes of stack (rounded up to keep 16 byte alignment) and copies them from `rsi`
///
/// Expects rsp to be 16 byte aligned on entry. Clobbers rax, rcx, rdi and rsi.
fn copy_stack_args(a: &mut CodeAssembler) -> Result<(), IcedError> {
    a.mov(rax, rdi)?;
    a.add(rax, 15)?;
    a.and(rax, -16)?;
    a.sub(rsp, rax)?;

    a.mov(rcx, rdi)?;
    a.mov(rdi, rsp)?;
    a.rep().movsb()?;
    Ok(())
}

/// Saves rbp, rbx and r12, leaving rsp 16 byte aligned
fn prologue(a: &mut CodeAssembler) -> Result<(), IcedError> {
    a.push(rbp)?;
    a.mov(rbp, rsp)?;
    a.push(rbx)?;
    a.push(r12)?;
    Ok(())
}

/// Stores the return registers to `[rbx]`, then undoes [`prologue`]
fn epilogue(a: &mut CodeAssembler) -> Result<(), IcedError> {
    a.mov(qword_ptr(rbx), rax)?;
    a.mov(qword_ptr(rbx + 8), rdx)?;
    a.movq(qword_ptr(rbx + 16), xmm0)?;
    a.movq(qword_ptr(rbx + 24), xmm1)?;

    a.lea(rsp, ptr(rbp - 16))?;
    a.pop(r12)?;
    a.pop(rbx)?;
    a.pop(rbp)?;
    a.ret()?;
    Ok(())
}

/// System V AMD64 call
///
/// `(stack_size, stack_data, int_regs, float_regs, target, ret)`
pub struct SysVTrampoline;
unsafe impl TrampolineGenerator for SysVTrampoline {
    fn generate(a: &mut CodeAssembler) -> Result<(), IcedError> {
        prologue(a)?;
        a.mov(rbx, r9)?;
        a.mov(r11, r8)?;
        a.mov(r10, rcx)?;
        a.mov(r12, rdx)?;

        copy_stack_args(a)?;

        let xmms = [xmm0, xmm1, xmm2, xmm3, xmm4, xmm5, xmm6, xmm7];
        debug_assert_eq!(xmms.len(), SYSV_FLOAT_REGS);
        for (i, xmm) in xmms.into_iter().enumerate() {
            a.movq(xmm, qword_ptr(r10 + 8 * i as i32))?;
        }
        let gprs = [rdi, rsi, rdx, rcx, r8, r9];
        debug_assert_eq!(gprs.len(), SYSV_INT_REGS);
        for (i, gpr) in gprs.into_iter().enumerate() {
            a.mov(gpr, qword_ptr(r12 + 8 * i as i32))?;
        }

        // upper bound of vector registers used, for variadic callees
        a.mov(eax, SYSV_FLOAT_REGS as u32)?;
        a.call(r11)?;

        epilogue(a)
    }
}

/// Microsoft x64 call
///
/// `(stack_size, stack_data, regs, target, ret)`
pub struct Win64Trampoline;
unsafe impl TrampolineGenerator for Win64Trampoline {
    fn generate(a: &mut CodeAssembler) -> Result<(), IcedError> {
        prologue(a)?;
        a.mov(rbx, r8)?;
        a.mov(r11, rcx)?;
        a.mov(r12, rdx)?;

        copy_stack_args(a)?;
        a.sub(rsp, SHADOW_SPACE)?;

        // each slot goes to both register files, the callee picks the one matching its prototype
        let slots = [(rcx, xmm0), (rdx, xmm1), (r8, xmm2), (r9, xmm3)];
        debug_assert_eq!(slots.len(), WIN64_REGS);
        for (i, (gpr, xmm)) in slots.into_iter().enumerate() {
            a.mov(gpr, qword_ptr(r12 + 8 * i as i32))?;
            a.movq(xmm, gpr)?;
        }

        a.call(r11)?;

        epilogue(a)
    }
}

/// Linux x64 `syscall`
///
/// `(int_regs, number, ret)`
pub struct SyscallTrampoline;
unsafe impl TrampolineGenerator for SyscallTrampoline {
    fn generate(a: &mut CodeAssembler) -> Result<(), IcedError> {
        a.push(rbx)?;
        a.mov(rbx, rdx)?;
        a.mov(rax, rsi)?;
        a.mov(r11, rdi)?;

        // the kernel takes the 4th argument in r10, rcx is clobbered by `syscall`
        let gprs = [rdi, rsi, rdx, r10, r8, r9];
        for (i, gpr) in gprs.into_iter().enumerate() {
            a.mov(gpr, qword_ptr(r11 + 8 * i as i32))?;
        }
        a.syscall()?;

        a.mov(qword_ptr(rbx), rax)?;
        a.mov(qword_ptr(rbx + 8), rdx)?;
        a.pop(rbx)?;
        a.ret()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use iced_x86::{Decoder, DecoderOptions, Mnemonic};

    use crate::code::x64::{SysVTrampoline, SyscallTrampoline, Win64Trampoline};
    use crate::code::{assemble, TrampolineGenerator};

    /// Decodes `code` into its mnemonics
    fn mnemonics(code: &[u8]) -> Vec<Mnemonic> {
        Decoder::new(64, code, DecoderOptions::NONE)
            .into_iter()
            .map(|i| i.mnemonic())
            .collect()
    }

    /// Assembles a generator and returns its mnemonics
    fn generated<G: TrampolineGenerator>() -> Vec<Mnemonic> {
        mnemonics(&assemble::<G>().unwrap())
    }

    #[test]
    /// The System V trampoline copies the stack, calls, and returns
    fn test_sysv_shape() {
        let code = generated::<SysVTrampoline>();
        assert_eq!(code.first(), Some(&Mnemonic::Push));
        assert!(code.contains(&Mnemonic::Movsb));
        assert_eq!(code.iter().filter(|&&m| m == Mnemonic::Call).count(), 1);
        assert_eq!(code.last(), Some(&Mnemonic::Ret));
    }

    #[test]
    /// The Win64 trampoline mirrors every slot into a vector register
    fn test_win64_shape() {
        let code = generated::<Win64Trampoline>();
        // 4 loads into xmm plus 2 stores of the return values
        assert_eq!(code.iter().filter(|&&m| m == Mnemonic::Movq).count(), 6);
        assert_eq!(code.last(), Some(&Mnemonic::Ret));
    }

    #[test]
    /// The syscall trampoline never calls, only traps
    fn test_syscall_shape() {
        let code = generated::<SyscallTrampoline>();
        assert!(code.contains(&Mnemonic::Syscall));
        assert!(!code.contains(&Mnemonic::Call));
    }
}
