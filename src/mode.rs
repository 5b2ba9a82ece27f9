//! # Mode
//!
//! Calling convention identifiers and the platforms they are resolved against
//!
//! Identifiers keep the numbering used by dyncall-style call VMs so raw values coming from
//! other language bindings can be passed straight through [`CallMode::from_raw`]. Only the
//! x64 entries resolve to a backend in this crate; everything else is reported as unsupported.

/// Declares [`CallMode`] along with its raw identifier table
macro_rules! call_modes {
    ($($(#[$meta:meta])* $name:ident = $raw:literal,)*) => {
        /// Calling convention requested for a call context
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum CallMode {
            $($(#[$meta])* $name = $raw,)*
        }

        impl CallMode {
            /// Every identifier in the table, in declaration order
            pub const ALL: &'static [CallMode] = &[$(CallMode::$name,)*];

            /// Looks up a raw identifier
            pub fn from_raw(raw: i32) -> Option<Self> {
                match raw {
                    $($raw => Some(CallMode::$name),)*
                    _ => None,
                }
            }
        }
    };
}

call_modes! {
    /// Platform default C convention
    #[default]
    CDefault = 0,
    /// x86 cdecl
    CX86Cdecl = 1,
    /// x86 Win32 stdcall
    CX86Win32Std = 2,
    /// x86 Win32 fastcall (Microsoft)
    CX86Win32FastMs = 3,
    /// x86 Win32 fastcall (GNU)
    CX86Win32FastGnu = 4,
    /// x86 Win32 thiscall (Microsoft)
    CX86Win32ThisMs = 5,
    /// x86 Win32 thiscall (GNU)
    CX86Win32ThisGnu = 6,
    /// Microsoft x64
    CX64Win64 = 7,
    /// System V AMD64
    CX64SysV = 8,
    /// PowerPC 32 Darwin
    CPpc32Darwin = 9,
    /// ARM EABI, ARM mode
    CArmArmEabi = 10,
    /// ARM EABI, Thumb mode
    CArmThumbEabi = 11,
    /// MIPS32 EABI
    CMips32Eabi = 12,
    /// PowerPC 32 System V
    CPpc32SysV = 13,
    /// ARM, ARM mode
    CArmArm = 14,
    /// ARM, Thumb mode
    CArmThumb = 15,
    /// MIPS32 o32
    CMips32O32 = 16,
    /// MIPS64 n32
    CMips64N32 = 17,
    /// MIPS64 n64
    CMips64N64 = 18,
    /// x86 Plan 9
    CX86Plan9 = 19,
    /// SPARC 32
    CSparc32 = 20,
    /// SPARC 64
    CSparc64 = 21,
    /// AArch64
    CArm64 = 22,
    /// PowerPC 64
    CPpc64 = 23,
    /// ARM hard float
    CArmArmHf = 30,
    /// Variadic function, fixed part
    CEllipsis = 100,
    /// Variadic function, variadic part
    CEllipsisVarargs = 101,
    /// Platform default syscall convention
    SysDefault = 200,
    /// x86 `int 0x80` on Linux
    SysX86Int80hLinux = 201,
    /// x86 `int 0x80` on the BSDs
    SysX86Int80hBsd = 202,
    /// x64 `syscall` following System V register assignment
    SysX64SyscallSysV = 204,
    /// PowerPC 32 `sc`
    SysPpc32 = 210,
    /// PowerPC 64 `sc`
    SysPpc64 = 211,
}

impl CallMode {
    /// Raw identifier of this mode
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Returns `true` for the system call identifiers
    pub fn is_syscall(self) -> bool {
        self.raw() >= CallMode::SysDefault.raw()
    }
}

impl TryFrom<i32> for CallMode {
    type Error = i32;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or(raw)
    }
}

/// Operating system family that decides the native x64 convention
///
/// POSIX systems use System V and can issue raw syscalls, Windows uses the Microsoft x64
/// convention and has no raw syscall backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// POSIX (System V AMD64)
    Unix,
    /// Windows (Microsoft x64)
    Windows,
}

impl Platform {
    /// The platform this crate was built for
    #[cfg(not(windows))]
    pub const HOST: Platform = Platform::Unix;
    /// The platform this crate was built for
    #[cfg(windows)]
    pub const HOST: Platform = Platform::Windows;

    /// The explicit identifier of this platform's native C convention
    pub fn native_mode(self) -> CallMode {
        match self {
            Self::Unix => CallMode::CX64SysV,
            Self::Windows => CallMode::CX64Win64,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::HOST
    }
}
