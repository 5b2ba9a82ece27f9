//! # VM
//!
//! Call contexts: argument lists assembled at runtime and handed to a trampoline
//!
//! ```no_run
//! use callvm::vm::{CallVm, DEFAULT_BUFFER_SIZE};
//!
//! extern "C" fn add(a: i32, b: f64) -> f64 {
//!     a as f64 + b
//! }
//!
//! let mut vm = CallVm::new(DEFAULT_BUFFER_SIZE).unwrap();
//! vm.arg_int(2);
//! vm.arg_double(0.5);
//! let ret = unsafe { vm.invoke(add as *const _) };
//! assert_eq!(ret.as_f64(), 2.5);
//! ```

use std::ffi::{c_char, c_int, c_long, c_short, c_void};
use std::fmt;

use log::{debug, warn};

use crate::aggregate::StructLayout;
use crate::backend::{self, Backend, BackendKind};
use crate::code::{self, RawReturn, Trampolines};
use crate::error::CallVmError;
use crate::mode::{CallMode, Platform};

use self::registers::RegisterData;
use self::stack::ArgStack;

pub mod registers;
pub mod stack;

/// Size budget that comfortably fits the arguments of almost any C function
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Arguments pushed so far for the next call
#[derive(Debug, Clone)]
pub struct CallState {
    /// Arguments passed in registers
    pub registers: RegisterData,
    /// Arguments passed on the stack
    pub stack: ArgStack,
}

impl CallState {
    /// Creates an empty state using `platform`'s register layout and `capacity` bytes of stack room
    pub fn new(platform: Platform, capacity: usize) -> Self {
        Self {
            registers: RegisterData::for_platform(platform),
            stack: ArgStack::with_capacity(capacity),
        }
    }
}

/// A reusable call context
///
/// Push the arguments of a call one by one, [`invoke`](CallVm::invoke) the target, then
/// [`reset`](CallVm::reset) before preparing the next call. The selected calling convention and the
/// stack buffer's capacity survive resets.
pub struct CallVm {
    /// Arguments of the call being prepared
    state: CallState,
    /// Backend of the selected calling convention
    backend: &'static dyn Backend,
    /// Mode `backend` was selected for
    mode: CallMode,
    /// Platform deciding the register layout and the available modes
    platform: Platform,
    /// Last mode selection failure, cleared by the next successful selection
    error: Option<CallVmError>,
    /// Process-wide trampolines
    trampolines: &'static Trampolines,
}

impl CallVm {
    /// Creates a context for the host platform using the default C convention
    ///
    /// `size` budgets the register area and the stack buffer together; whatever the register area
    /// leaves over is reserved up front for stack arguments. The stack buffer still grows past that
    /// when needed.
    pub fn new(size: usize) -> Result<Self, CallVmError> {
        Self::with_platform(size, Platform::HOST)
    }

    /// Creates a context using `platform`'s register layout and modes
    pub fn with_platform(size: usize, platform: Platform) -> Result<Self, CallVmError> {
        let trampolines = code::trampolines()?;
        let mode = CallMode::default();
        let backend = backend::select(mode, platform)?;
        let capacity = size.saturating_sub(RegisterData::area_size(platform));

        let mut vm = Self {
            state: CallState::new(platform, capacity),
            backend,
            mode,
            platform,
            error: None,
            trampolines,
        };
        vm.reset();
        debug!("created call context for {platform:?} with {capacity} bytes of stack room");
        Ok(vm)
    }

    /// Destroys the context
    pub fn free(self) {
        debug!("freeing call context");
    }

    /// Clears all pushed arguments, keeping the mode and the buffer capacity
    pub fn reset(&mut self) {
        self.backend.reset(&mut self.state);
    }

    /// Selects the calling convention for the following calls
    ///
    /// On failure the previous convention stays active and the failure is also kept in
    /// [`error`](CallVm::error) until a later selection succeeds. Already pushed arguments are kept
    /// either way.
    pub fn set_mode(&mut self, mode: CallMode) -> Result<(), CallVmError> {
        match backend::select(mode, self.platform) {
            Ok(backend) => {
                debug!("switched to {mode:?} ({:?})", backend.kind());
                self.backend = backend;
                self.mode = mode;
                self.error = None;
                Ok(())
            }
            Err(err) => {
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// [`set_mode`](CallVm::set_mode) for raw mode identifiers
    pub fn set_mode_raw(&mut self, raw: i32) -> Result<(), CallVmError> {
        match CallMode::from_raw(raw) {
            Some(mode) => self.set_mode(mode),
            None => {
                warn!("unknown calling convention identifier {raw}");
                let err = CallVmError::UnknownMode(raw);
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Failure of the last mode selection, if it failed
    pub fn error(&self) -> Option<&CallVmError> {
        self.error.as_ref()
    }

    /// Currently selected calling convention
    pub fn mode(&self) -> CallMode {
        self.mode
    }

    /// Backend of the currently selected calling convention
    pub fn backend(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Platform this context was created for
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Arguments pushed to registers so far
    pub fn registers(&self) -> &RegisterData {
        &self.state.registers
    }

    /// Arguments pushed to the stack so far
    pub fn stack(&self) -> &ArgStack {
        &self.state.stack
    }

    /// Pushes a `bool`
    pub fn arg_bool(&mut self, value: bool) {
        self.backend.arg_bool(&mut self.state, value);
    }

    /// Pushes a `char`
    pub fn arg_char(&mut self, value: c_char) {
        self.backend.arg_char(&mut self.state, value);
    }

    /// Pushes a `short`
    pub fn arg_short(&mut self, value: c_short) {
        self.backend.arg_short(&mut self.state, value);
    }

    /// Pushes an `int`
    pub fn arg_int(&mut self, value: c_int) {
        self.backend.arg_int(&mut self.state, value);
    }

    /// Pushes a `long`
    pub fn arg_long(&mut self, value: c_long) {
        self.backend.arg_long(&mut self.state, value);
    }

    /// Pushes a `long long`
    pub fn arg_long_long(&mut self, value: i64) {
        self.backend.arg_long_long(&mut self.state, value);
    }

    /// Pushes a `float`
    pub fn arg_float(&mut self, value: f32) {
        self.backend.arg_float(&mut self.state, value);
    }

    /// Pushes a `double`
    pub fn arg_double(&mut self, value: f64) {
        self.backend.arg_double(&mut self.state, value);
    }

    /// Pushes a pointer
    pub fn arg_pointer(&mut self, value: *const c_void) {
        self.backend.arg_pointer(&mut self.state, value);
    }

    /// Pushes a struct by value
    ///
    /// `data` must hold exactly `layout.size()` bytes. Fails if the active convention cannot pass
    /// structs at all, in which case nothing is pushed.
    pub fn arg_struct(&mut self, layout: &StructLayout, data: &[u8]) -> Result<(), CallVmError> {
        self.backend.arg_struct(&mut self.state, layout, data)
    }

    /// Calls `target` with the pushed arguments
    ///
    /// The same call is made whatever `target` returns; read the result out of the returned
    /// [`RawReturn`] according to the target's return type. For the syscall modes `target` is the
    /// system call number. The pushed arguments are kept, call [`reset`](CallVm::reset) before
    /// preparing another call.
    ///
    /// # Safety
    ///
    /// `target` must be a function that can be called under the selected convention with exactly
    /// the pushed arguments, and that returns normally to its caller.
    pub unsafe fn invoke(&mut self, target: *const c_void) -> RawReturn {
        self.backend.invoke(&self.state, self.trampolines, target)
    }
}

impl fmt::Debug for CallVm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallVm")
            .field("state", &self.state)
            .field("backend", &self.backend.kind())
            .field("mode", &self.mode)
            .field("platform", &self.platform)
            .field("error", &self.error)
            .finish()
    }
}
