//! Ready queue abstraction
//!
//! The scheduler only needs push-to-tail / pop-from-head; the trait keeps
//! the policy swappable.
//!
//! # Implementations
//! - `FifoQueue` - strict FIFO, round-robin among ready threads

mod fifo;

pub use fifo::FifoQueue;

use uthread_core::id::GreenId;

/// Queue of runnable, non-executing threads
///
/// Accessed only from inside a critical section on the owning OS thread.
pub trait ReadyQueue {
    /// Make a thread ready to run
    fn push(&mut self, id: GreenId);

    /// Next thread to run
    fn pop(&mut self) -> Option<GreenId>;

    /// Next thread to run, without removing it
    fn peek(&self) -> Option<GreenId>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make room for `total` entries so pushes from the signal handler
    /// never allocate
    fn reserve(&mut self, total: usize);
}
