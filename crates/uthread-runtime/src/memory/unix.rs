//! Unix stack mapping using mmap

use uthread_core::error::MemoryError;

/// System page size
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as usize
    }
}

/// One green thread stack
///
/// A private anonymous mapping whose lowest page is PROT_NONE, so running
/// off the end of the stack faults instead of corrupting a neighbour.
///
/// ```text
/// base                                              base + len
/// | guard (PROT_NONE) |  usable stack (RW) ... grows down  <- top |
/// ```
#[derive(Debug)]
pub struct Stack {
    base: *mut u8,
    len: usize,
    guard: usize,
}

impl Stack {
    /// Map a stack with at least `size` usable bytes
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        let page = page_size();
        let usable = size
            .checked_add(page - 1)
            .map(|s| s & !(page - 1))
            .ok_or(MemoryError::InvalidSize)?;
        if usable == 0 {
            return Err(MemoryError::InvalidSize);
        }
        let len = usable.checked_add(page).ok_or(MemoryError::InvalidSize)?;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(MemoryError::AllocationFailed);
        }

        // Low page becomes the guard
        let ret = unsafe { libc::mprotect(base, page, libc::PROT_NONE) };
        if ret != 0 {
            unsafe {
                libc::munmap(base, len);
            }
            return Err(MemoryError::ProtectionFailed);
        }

        Ok(Self {
            base: base as *mut u8,
            len,
            guard: page,
        })
    }

    /// Highest address (exclusive); the stack grows down from here
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.len) }
    }

    /// Lowest usable address (just above the guard page)
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        unsafe { self.base.add(self.guard) }
    }

    /// Usable bytes, excluding the guard page
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.len - self.guard
    }

    /// Give the usable pages back to the kernel, keeping the mapping
    pub fn release_pages(&self) -> Result<(), MemoryError> {
        let ret = unsafe {
            libc::madvise(
                self.bottom() as *mut libc::c_void,
                self.usable_size(),
                libc::MADV_DONTNEED,
            )
        };
        if ret != 0 {
            return Err(MemoryError::AdviseFailed);
        }
        Ok(())
    }

    /// Whether `addr` lies in the usable part of this stack
    #[cfg(test)]
    fn contains(&self, addr: usize) -> bool {
        addr >= self.bottom() as usize && addr <= self.top() as usize
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.len);
        }
    }
}
