//! # Stack
//!
//! Byte buffer for the arguments that end up on the stack of the callee

/// Arguments that did not fit in registers, in the exact byte layout the callee's stack frame expects
///
/// Values are appended back to back without padding. The buffer keeps its allocation across
/// [`reset`](ArgStack::reset)s so reused contexts stop allocating once they reach their steady state size.
#[derive(Debug, Clone, Default)]
pub struct ArgStack {
    /// Raw argument bytes
    data: Vec<u8>,
}

impl ArgStack {
    /// Creates an empty buffer with room for `capacity` bytes before it needs to grow
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Appends raw bytes, growing the buffer if needed
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Number of bytes appended since the last reset
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing was appended since the last reset
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes the buffer can hold before reallocating
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Pointer to the first argument byte
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Appended bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Drops all appended bytes but keeps the allocation
    pub fn reset(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::vm::stack::ArgStack;

    #[test]
    /// Appends are contiguous and keep their order
    fn test_append() {
        let mut stack = ArgStack::with_capacity(4);
        stack.append(&[1, 2, 3]);
        stack.append(&[4, 5, 6]);

        // grew past the initial capacity without losing anything
        assert_eq!(stack.as_slice(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(stack.len(), 6);
    }

    #[test]
    /// Reset keeps the capacity around
    fn test_reset_keeps_capacity() {
        let mut stack = ArgStack::with_capacity(64);
        stack.append(&[0; 48]);
        let capacity = stack.capacity();

        stack.reset();
        assert!(stack.is_empty());
        assert_eq!(stack.capacity(), capacity);
    }
}
