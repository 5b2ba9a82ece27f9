//! # Alloc
//!
//! Executable memory for generated code
//!
//! Code is copied into a fresh read-write map, which is then flipped to read-execute so the
//! region is never writable and executable at the same time.

use std::ops::Deref;
use std::slice;

use log::debug;
use region::Protection;

use crate::error::TrampolineError;

/// A read-only, executable copy of some machine code
pub struct ExecutableMemory {
    /// Backing memory map, unmapped on drop
    map: mmap::MemoryMap,
    /// Number of code bytes at the start of the map
    len: usize,
}

impl ExecutableMemory {
    /// Maps a new region, copies `code` into it and makes it executable
    pub fn new(code: &[u8]) -> Result<Self, TrampolineError> {
        let map = mmap::MemoryMap::new(
            code.len().max(1),
            &[mmap::MapOption::MapReadable, mmap::MapOption::MapWritable],
        )
        .map_err(TrampolineError::Map)?;

        unsafe {
            // Safety: the map is writable and at least `code.len()` bytes long
            std::ptr::copy_nonoverlapping(code.as_ptr(), map.data(), code.len());
            // Safety: the region belongs to `map`, nothing else refers to it yet
            region::protect(map.data() as *const u8, map.len(), Protection::READ_EXECUTE)?;
        }
        debug!("mapped {} bytes of code at {:p}", code.len(), map.data());

        Ok(Self {
            map,
            len: code.len(),
        })
    }

    /// Address of the first code byte
    pub fn as_ptr(&self) -> *const u8 {
        self.map.data()
    }
}

impl Deref for ExecutableMemory {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        // Safety: the map stays readable and at least `len` bytes long for our whole lifetime
        unsafe { slice::from_raw_parts(self.map.data(), self.len) }
    }
}

// Safety: the map is never written after construction, so sharing the pointer is fine
unsafe impl Send for ExecutableMemory {}
unsafe impl Sync for ExecutableMemory {}
