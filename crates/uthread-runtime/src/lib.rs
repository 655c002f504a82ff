//! # uthread-runtime
//!
//! Single-OS-thread green-thread runtime.
//!
//! This crate provides:
//! - Context switching (architecture-specific naked assembly)
//! - Guard-paged stacks with a reuse cache
//! - Timer-driven preemption on `SIGVTALRM`, with masked critical sections
//! - The FIFO scheduler: spawn, yield, join
//! - `Mutex` with direct handoff and a `Condvar` that switches to the woken thread
//!
//! A [`Runtime`] owns every green thread it spawns. The thread that creates
//! it becomes the main green thread; all other threads run on its OS thread.

pub mod config;
pub mod memory;
pub mod signal;
pub mod arch;
pub mod timer;
pub mod sync;
mod tls;
mod ready_queue;
mod scheduler;
mod runtime;

// Re-exports
pub use config::{ConfigError, RuntimeConfig};
pub use runtime::{JoinHandle, Runtime, RuntimeStats};
pub use sync::{Condvar, Mutex, MutexGuard};
pub use tls::has_runtime;

// Platform detection
cfg_if::cfg_if! {
    if #[cfg(not(unix))] {
        compile_error!("uthread-runtime requires a Unix platform");
    }
}

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub use arch::x86_64 as current_arch;
    } else if #[cfg(target_arch = "aarch64")] {
        pub use arch::aarch64 as current_arch;
    } else {
        compile_error!("Unsupported architecture");
    }
}
