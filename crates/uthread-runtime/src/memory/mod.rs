//! Stack memory for green threads
//!
//! Platform-specific code maps individual stacks; [`StackPool`] keeps a
//! bounded number of them mapped across join/spawn cycles.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}

use uthread_core::error::MemoryError;
use uthread_core::kwarn;

/// Bounded cache of same-sized stacks
///
/// Returned stacks have their pages released with `MADV_DONTNEED` so a
/// cached stack costs address space, not memory.
#[derive(Debug)]
pub struct StackPool {
    stack_size: usize,
    capacity: usize,
    cache: Vec<Stack>,
    mapped: usize,
}

impl StackPool {
    pub fn new(stack_size: usize, capacity: usize) -> Self {
        Self {
            stack_size,
            capacity,
            cache: Vec::with_capacity(capacity),
            mapped: 0,
        }
    }

    /// Reuse a cached stack or map a new one
    pub fn take(&mut self) -> Result<Stack, MemoryError> {
        if let Some(stack) = self.cache.pop() {
            return Ok(stack);
        }
        let stack = Stack::new(self.stack_size)?;
        self.mapped += 1;
        Ok(stack)
    }

    /// Return a stack no context runs on anymore
    pub fn give(&mut self, stack: Stack) {
        if self.cache.len() >= self.capacity {
            self.mapped -= 1;
            return;
        }
        if let Err(e) = stack.release_pages() {
            kwarn!("stack page release failed: {}", e);
        }
        self.cache.push(stack);
    }

    #[inline]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Stacks currently mapped through this pool (in use or cached)
    #[inline]
    pub fn mapped(&self) -> usize {
        self.mapped
    }

    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_reuses_returned_stack() {
        let mut pool = StackPool::new(32 * 1024, 4);
        let a = pool.take().unwrap();
        let a_top = a.top();
        assert_eq!(pool.mapped(), 1);

        pool.give(a);
        assert_eq!(pool.cached(), 1);

        let b = pool.take().unwrap();
        assert_eq!(b.top(), a_top);
        assert_eq!(pool.cached(), 0);
        assert_eq!(pool.mapped(), 1);
    }

    #[test]
    fn test_pool_is_bounded() {
        let mut pool = StackPool::new(16 * 1024, 1);
        let a = pool.take().unwrap();
        let b = pool.take().unwrap();
        assert_eq!(pool.mapped(), 2);

        pool.give(a);
        pool.give(b);
        assert_eq!(pool.cached(), 1);
        assert_eq!(pool.mapped(), 1);
    }
}
