//! # uthread-core
//!
//! Core types for the uthread green-thread runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Context switching, stacks, signals and the scheduler itself live in
//! `uthread-runtime`.
//!
//! ## Modules
//!
//! - `id` - green thread identifier
//! - `state` - lifecycle and queue-membership tags
//! - `queue` - FIFO of thread ids (ready queue and wait lists)
//! - `slot` - id allocator with generations
//! - `error` - error types
//! - `kprint` - leveled stderr logging macros
//! - `env` - environment variable helpers

pub mod id;
pub mod state;
pub mod queue;
pub mod slot;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::GreenId;
pub use state::{QueueKind, ThreadState};
pub use queue::IdQueue;
pub use slot::SlotAllocator;
pub use error::{MemoryError, SchedError, SchedResult};
pub use env::{env_flag, env_get, env_micros};

/// Memory layout and sizing constants
pub mod constants {
    /// Smallest stack the runtime accepts.
    ///
    /// A preempted thread carries a kernel signal frame (several KiB with
    /// AVX-512 state) on top of its own frames.
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Largest stack the runtime accepts (1 GiB)
    pub const MAX_STACK_SIZE: usize = 1024 * 1024 * 1024;

    /// Initial capacity of every id queue (avoids reallocation on hot paths)
    pub const QUEUE_PREALLOC: usize = 64;
}
