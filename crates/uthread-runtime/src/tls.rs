//! Thread-local pointer to the runtime owning this OS thread
//!
//! The preemption signal handler has no other way to find the scheduler it
//! interrupts. The pointer is set for the lifetime of the runtime and is
//! also what enforces one runtime per OS thread.

use crate::scheduler::Scheduler;
use std::cell::Cell;

thread_local! {
    static CURRENT_RUNTIME: Cell<*const Scheduler> = const { Cell::new(std::ptr::null()) };
}

/// Register `sched` as this OS thread's runtime
#[inline]
pub(crate) fn set_runtime(sched: *const Scheduler) {
    CURRENT_RUNTIME.with(|cell| cell.set(sched));
}

/// Unregister `sched`, if it is the registered runtime
#[inline]
pub(crate) fn clear_runtime(sched: *const Scheduler) {
    CURRENT_RUNTIME.with(|cell| {
        if cell.get() == sched {
            cell.set(std::ptr::null());
        }
    });
}

/// This OS thread's runtime, null if none
#[inline]
pub(crate) fn current_runtime() -> *const Scheduler {
    // try_with: a tick may land while thread-locals are being torn down
    CURRENT_RUNTIME
        .try_with(|cell| cell.get())
        .unwrap_or(std::ptr::null())
}

/// Whether a runtime is active on this OS thread
#[inline]
pub fn has_runtime() -> bool {
    !current_runtime().is_null()
}
