// src/memory.rs
//
// Aligned buffers for O_DIRECT replay.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::IoReplayError;

/// Aligned memory buffer suitable for O_DIRECT I/O
///
/// O_DIRECT requires the user buffer to start on a sector (or page) boundary;
/// a plain `Vec<u8>` gives no such guarantee.
#[derive(Debug)]
pub struct AlignedBuf {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// The buffer owns its allocation exclusively, like a Box<[u8]>.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

impl AlignedBuf {
    /// Allocate a zeroed buffer of `len` bytes aligned to `align`
    ///
    /// # Arguments
    /// * `len` - Buffer size in bytes (must be non-zero)
    /// * `align` - Alignment requirement, a power of two (512 for sector-aligned I/O)
    pub fn new(len: usize, align: usize) -> Result<Self, IoReplayError> {
        let layout = Layout::from_size_align(len, align)
            .ok()
            .filter(|layout| layout.size() > 0)
            .ok_or(IoReplayError::Allocation { size: len, align })?;

        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(IoReplayError::Allocation { size: len, align })?;
        Ok(Self { ptr, len, layout })
    }

    /// Allocate and fill every byte with `byte`
    pub fn filled(len: usize, align: usize, byte: u8) -> Result<Self, IoReplayError> {
        let mut buf = Self::new(len, align)?;
        buf.as_mut_slice().fill(byte);
        Ok(buf)
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len bytes and uniquely borrowed through &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn align(&self) -> usize {
        self.layout.align()
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with this exact layout.
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_and_fill() {
        let buf = AlignedBuf::filled(4096, 512, b'B').unwrap();
        assert_eq!(buf.len(), 4096);
        assert_eq!(buf.align(), 512);
        assert_eq!(buf.as_slice().as_ptr() as usize % 512, 0);
        assert!(buf.as_slice().iter().all(|&b| b == b'B'));
    }

    #[test]
    fn test_invalid_layouts_are_errors() {
        assert!(matches!(
            AlignedBuf::new(0, 512),
            Err(IoReplayError::Allocation { size: 0, align: 512 })
        ));
        assert!(AlignedBuf::new(512, 3).is_err());
    }
}
