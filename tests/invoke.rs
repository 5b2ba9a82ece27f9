//! End-to-end calls through the generated trampolines

use std::ffi::c_void;

use callvm::aggregate::{FieldType, StructLayout};
use callvm::vm::DEFAULT_BUFFER_SIZE;
use callvm::{CallMode, CallVm, Platform};

/// Installs a test logger once
fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a System V context, whatever the host
fn sysv() -> CallVm {
    init();
    CallVm::with_platform(DEFAULT_BUFFER_SIZE, Platform::Unix).unwrap()
}

/// Creates a Microsoft x64 context, whatever the host
fn win64() -> CallVm {
    init();
    CallVm::with_platform(DEFAULT_BUFFER_SIZE, Platform::Windows).unwrap()
}

extern "sysv64" fn weighted_ints(
    a: i64,
    b: i64,
    c: i64,
    d: i64,
    e: i64,
    f: i64,
    g: i64,
    h: i64,
    i: i64,
) -> i64 {
    a + 2 * b + 3 * c + 4 * d + 5 * e + 6 * f + 7 * g + 8 * h + 9 * i
}

#[allow(clippy::too_many_arguments)]
extern "sysv64" fn mixed(
    a: i32,
    x0: f64,
    x1: f32,
    x2: f64,
    x3: f64,
    x4: f64,
    x5: f64,
    x6: f64,
    x7: f64,
    x8: f64,
    x9: f32,
    b: i8,
) -> f64 {
    a as f64 + x0 + x1 as f64 + x2 + x3 + x4 + x5 + x6 + x7 + 100.0 * x8 + 1000.0 * x9 as f64
        - b as f64
}

extern "sysv64" fn halve(x: f32) -> f32 {
    x / 2.0
}

extern "sysv64" fn read(p: *const i32) -> i32 {
    unsafe { *p }
}

extern "sysv64" fn identity(p: *const c_void) -> *const c_void {
    p
}

extern "sysv64" fn narrow(a: i8, b: i16, c: bool, d: u8) -> i64 {
    a as i64 * 1000 + b as i64 + c as i64 + d as i64
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Pair {
    id: i64,
    weight: f64,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Triple {
    a: i64,
    b: i64,
    c: i64,
}

extern "sysv64" fn pair_score(scale: i32, pair: Pair) -> f64 {
    scale as f64 * (pair.id as f64 + pair.weight)
}

extern "sysv64" fn triple_sum(t: Triple) -> i64 {
    t.a * 100 + t.b * 10 + t.c
}

extern "win64" fn win_mixed(a: i32, b: f64, c: i64, d: f32, e: i64, f: f64) -> f64 {
    a as f64 + b + c as f64 + d as f64 + 10.0 * e as f64 + 100.0 * f
}

extern "win64" fn win_ints(a: i64, b: i64, c: i64, d: i64, e: i64, f: i64, g: i64) -> i64 {
    a + b + c + d + e * 10 + f * 100 + g * 1000
}

/// Raw bytes of a value
fn bytes_of<T: Copy>(value: &T) -> Vec<u8> {
    unsafe { std::slice::from_raw_parts(value as *const T as *const u8, std::mem::size_of::<T>()) }
        .to_vec()
}

#[test]
/// Integers past the register budget reach the callee through the stack
fn test_sysv_stack_ints() {
    let mut vm = sysv();
    for i in 1..=9 {
        vm.arg_long_long(i);
    }
    assert_eq!(vm.stack().len(), 24);

    let ret = unsafe { vm.invoke(weighted_ints as *const _) };
    let expected: i64 = (1..=9).map(|i| i * i).sum();
    assert_eq!(ret.rax() as i64, expected);
}

#[test]
/// Integer and float classes spill independently
fn test_sysv_mixed_classes() {
    let mut vm = sysv();
    vm.arg_int(5);
    vm.arg_double(1.0);
    vm.arg_float(2.0);
    for _ in 0..6 {
        vm.arg_double(0.5);
    }
    // the 9th and 10th floating point arguments go to the stack
    vm.arg_double(3.0);
    vm.arg_float(4.0);
    vm.arg_char(-2);

    let ret = unsafe { vm.invoke(mixed as *const _) };
    assert_eq!(ret.as_f64(), 5.0 + 1.0 + 2.0 + 3.0 + 300.0 + 4000.0 + 2.0);
}

#[test]
/// Float results come back in xmm0
fn test_sysv_float_return() {
    let mut vm = sysv();
    vm.arg_float(9.0);
    let ret = unsafe { vm.invoke(halve as *const _) };
    assert_eq!(ret.as_f32(), 4.5);
}

#[test]
/// Pointers travel in integer registers and come back in rax
fn test_sysv_pointers() {
    let value = 1234i32;
    let mut vm = sysv();
    vm.arg_pointer(&value as *const i32 as *const _);
    let ret = unsafe { vm.invoke(read as *const _) };
    assert_eq!(ret.rax() as i32, 1234);

    vm.reset();
    vm.arg_pointer(&value as *const i32 as *const _);
    let ret = unsafe { vm.invoke(identity as *const _) };
    assert_eq!(ret.as_ptr() as *const i32, &value as *const i32);
}

#[test]
/// Narrow arguments arrive with their value intact
fn test_sysv_narrow() {
    let mut vm = sysv();
    vm.arg_char(-3);
    vm.arg_short(-300);
    vm.arg_bool(true);
    vm.arg_char(7);
    let ret = unsafe { vm.invoke(narrow as *const _) };
    assert_eq!(ret.rax() as i64, -3000 - 300 + 1 + 7);
}

#[test]
/// A 16 byte struct is unrolled into an integer and an sse register
fn test_sysv_small_struct() {
    let layout = StructLayout::builder()
        .field(FieldType::LongLong, 1)
        .field(FieldType::Double, 1)
        .build();
    let pair = Pair {
        id: 4,
        weight: 0.5,
    };

    let mut vm = sysv();
    vm.arg_int(2);
    vm.arg_struct(&layout, &bytes_of(&pair)).unwrap();
    assert_eq!(vm.registers().int_count(), 2);
    assert_eq!(vm.registers().float_count(), 1);

    let ret = unsafe { vm.invoke(pair_score as *const _) };
    assert_eq!(ret.as_f64(), 9.0);
}

#[test]
/// A 24 byte struct is passed purely through its stack copy
fn test_sysv_large_struct() {
    let layout = StructLayout::builder().field(FieldType::LongLong, 3).build();
    let triple = Triple { a: 1, b: 2, c: 3 };

    let mut vm = sysv();
    vm.arg_struct(&layout, &bytes_of(&triple)).unwrap();
    assert_eq!(vm.registers().int_count(), 0);

    let ret = unsafe { vm.invoke(triple_sum as *const _) };
    assert_eq!(ret.rax(), 123);
}

#[test]
/// One context serves several calls when reset in between
fn test_reuse() {
    let mut vm = sysv();
    vm.arg_float(1.0);
    assert_eq!(unsafe { vm.invoke(halve as *const _) }.as_f32(), 0.5);

    vm.reset();
    vm.arg_float(3.0);
    assert_eq!(unsafe { vm.invoke(halve as *const _) }.as_f32(), 1.5);
}

#[cfg(unix)]
#[test]
/// Varargs mode reaches a variadic callee
fn test_sysv_variadic() {
    use std::ffi::{c_char, CStr};

    extern "C" {
        fn snprintf(buf: *mut c_char, len: usize, fmt: *const c_char, ...) -> i32;
    }

    let mut buf = [0 as c_char; 64];
    let fmt = b"%d %.2f %s\0";
    let word = b"ok\0";

    let mut vm = sysv();
    vm.set_mode(CallMode::CEllipsis).unwrap();
    vm.arg_pointer(buf.as_mut_ptr() as *const _);
    vm.arg_long_long(buf.len() as i64);
    vm.arg_pointer(fmt.as_ptr() as *const _);
    vm.set_mode(CallMode::CEllipsisVarargs).unwrap();
    vm.arg_int(42);
    vm.arg_double(2.5);
    vm.arg_pointer(word.as_ptr() as *const _);

    let ret = unsafe { vm.invoke(snprintf as *const _) };
    let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
    assert_eq!(text.to_str().unwrap(), "42 2.50 ok");
    assert_eq!(ret.rax() as i32, 10);
}

#[test]
/// Microsoft x64 positions, shadow space and stack arguments
fn test_win64_mixed() {
    let mut vm = win64();
    vm.arg_int(1);
    vm.arg_double(2.0);
    vm.arg_long_long(3);
    vm.arg_float(4.0);
    vm.arg_long_long(5);
    vm.arg_double(6.0);
    assert_eq!(vm.stack().len(), 16);

    let ret = unsafe { vm.invoke(win_mixed as *const _) };
    assert_eq!(ret.as_f64(), 1.0 + 2.0 + 3.0 + 4.0 + 50.0 + 600.0);
}

#[test]
/// Microsoft x64 integer stack arguments keep their order
fn test_win64_ints() {
    let mut vm = win64();
    for i in 1..=7 {
        vm.arg_long_long(i);
    }

    let ret = unsafe { vm.invoke(win_ints as *const _) };
    assert_eq!(ret.rax(), 1 + 2 + 3 + 4 + 50 + 600 + 7000);
}

#[cfg(target_os = "linux")]
#[test]
/// A raw getpid syscall matches the process id
fn test_syscall_getpid() {
    /// `getpid` on x86-64 Linux
    const SYS_GETPID: usize = 39;

    let mut vm = CallVm::new(DEFAULT_BUFFER_SIZE).unwrap();
    vm.set_mode(CallMode::SysX64SyscallSysV).unwrap();
    let ret = unsafe { vm.invoke(SYS_GETPID as *const _) };
    assert_eq!(ret.rax() as u32, std::process::id());
}

#[cfg(target_os = "linux")]
#[test]
/// Syscall arguments come from the integer slots
fn test_syscall_write() {
    /// `write` on x86-64 Linux
    const SYS_WRITE: usize = 1;

    let message = b"";
    let mut vm = CallVm::new(DEFAULT_BUFFER_SIZE).unwrap();
    vm.set_mode(CallMode::SysDefault).unwrap();
    // a zero length write to stdout succeeds and writes nothing
    vm.arg_int(1);
    vm.arg_pointer(message.as_ptr() as *const _);
    vm.arg_long_long(0);
    let ret = unsafe { vm.invoke(SYS_WRITE as *const _) };
    assert_eq!(ret.rax(), 0);
}
