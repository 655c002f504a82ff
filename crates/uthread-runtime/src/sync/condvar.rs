//! Green-thread condition variable
//!
//! A FIFO of waiting threads with no memory: a signal with nobody waiting
//! is lost. `signal` runs the woken thread immediately, the signaller goes
//! to the back of the ready queue.

use super::mutex::MutexGuard;
use crate::runtime::Runtime;

use uthread_core::queue::IdQueue;
use uthread_core::state::QueueKind;

use std::cell::RefCell;
use std::fmt;

pub struct Condvar {
    rt: Runtime,
    waiters: RefCell<IdQueue>,
}

impl Condvar {
    pub fn new(rt: &Runtime) -> Self {
        Self {
            rt: rt.clone(),
            waiters: RefCell::new(IdQueue::new()),
        }
    }

    /// Atomically release `guard`'s mutex and wait for a signal
    ///
    /// Returns with the mutex held again. No other thread can signal
    /// between the release and the wait.
    ///
    /// # Panics
    ///
    /// If the mutex belongs to a different runtime.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mutex = guard.mutex;
        assert!(
            mutex.runtime().ptr_eq(&self.rt),
            "condvar and mutex belong to different runtimes"
        );
        let sched = self.rt.sched();
        let _cs = sched.critical();
        // Released by hand below
        std::mem::forget(guard);

        self.waiters.borrow_mut().push(sched.current());
        mutex.release_locked(sched);
        sched.suspend(QueueKind::CondWait);

        mutex.acquire_locked(sched);
        MutexGuard { mutex }
    }

    /// Wait for a signal without any mutex
    pub fn wait_unlocked(&self) {
        let sched = self.rt.sched();
        let _cs = sched.critical();
        self.waiters.borrow_mut().push(sched.current());
        sched.suspend(QueueKind::CondWait);
    }

    /// Wake the longest waiter and switch to it right away
    ///
    /// No-op without waiters. Wakes at most one thread.
    pub fn signal(&self) {
        let sched = self.rt.sched();
        let _cs = sched.critical();
        let waiter = self.waiters.borrow_mut().pop();
        if let Some(waiter) = waiter {
            sched.hand_off(waiter, QueueKind::CondWait);
        }
    }

    /// Threads currently waiting
    pub fn waiting(&self) -> usize {
        let _cs = self.rt.sched().critical();
        self.waiters.borrow().len()
    }
}

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condvar")
            .field("waiting", &self.waiters.borrow().len())
            .finish()
    }
}
