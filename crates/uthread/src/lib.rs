//! # uthread - user-space green threads
//!
//! Many green threads multiplexed onto the OS thread that creates the
//! [`Runtime`]. Threads switch on `yield_now`, `join`, a contended
//! [`Mutex`], a [`Condvar`] wait or signal, and, when a preemption period is
//! configured, on every `SIGVTALRM` tick outside a critical section.
//!
//! ## Features
//!
//! - **Hand-written context switch**: callee-saved registers only, x86_64 and aarch64
//! - **Guard-paged stacks**: fixed size, cached and reused after join
//! - **Preemption**: per-thread CPU-time timer, masked critical sections
//! - **FIFO scheduling**: ready queue and every wait list are strict FIFO
//! - **Mutex with direct handoff**: unlock passes ownership to the first waiter
//! - **Condvar**: `signal` switches straight to the woken thread
//!
//! ## Quick Start
//!
//! ```no_run
//! use uthread::{Runtime, RuntimeConfig};
//!
//! let rt = Runtime::new(RuntimeConfig::from_env()).unwrap();
//! let worker = rt.clone();
//! let h = rt
//!     .spawn(
//!         move |n: u64| {
//!             worker.yield_now();
//!             n * 2
//!         },
//!         21,
//!     )
//!     .unwrap();
//! assert_eq!(rt.join(h), Ok(42));
//! ```
//!
//! ## Preemption and non-reentrant code
//!
//! The timer signal can interrupt a green thread anywhere outside the
//! runtime's own critical sections. Code that is not reentrant (stdio, the
//! allocator) must not be interrupted by another green thread running the
//! same code; wrap it in [`Runtime::without_preemption`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Runtime / Mutex / Condvar                   │
//! └──────────────────────────────────────────────┘
//!                  │
//!                  ▼
//! ┌──────────────────────────────────────────────┐
//! │  Scheduler: ready queue, switch, join        │◄── SIGVTALRM
//! └──────────────────────────────────────────────┘
//!                  │
//!                  ▼
//! ┌──────────────────────────────────────────────┐
//! │  Context switch (asm) + mmap stacks          │
//! └──────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use uthread_core::{GreenId, QueueKind, SchedError, SchedResult, ThreadState};

// Re-export kprint macros for debug logging
pub use uthread_core::{kdebug, kerror, kinfo, kprint, kprintln, ktrace, kwarn};
pub use uthread_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};

// Re-export env utilities
pub use uthread_core::{env_flag, env_get, env_micros};

// Re-export runtime types
pub use uthread_runtime::{
    has_runtime,
    Condvar,
    ConfigError,
    JoinHandle,
    Mutex,
    MutexGuard,
    Runtime,
    RuntimeConfig,
    RuntimeStats,
};
