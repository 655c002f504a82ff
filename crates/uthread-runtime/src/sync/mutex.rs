//! Green-thread mutex with direct handoff
//!
//! Unlocking with waiters present does not release the lock: ownership
//! passes straight to the longest waiter, which is moved to the ready
//! queue already holding it. A thread that has been waiting can therefore
//! never lose the lock to one that just arrived.

use crate::runtime::Runtime;
use crate::scheduler::Scheduler;

use uthread_core::id::GreenId;
use uthread_core::queue::IdQueue;
use uthread_core::state::QueueKind;

use std::cell::{Cell, RefCell, UnsafeCell};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Mutual exclusion between green threads of one runtime
///
/// Not `Send`/`Sync`: it holds a runtime handle and is only ever touched by
/// the runtime's OS thread. Share it between green threads with `Rc`.
pub struct Mutex<T> {
    rt: Runtime,
    held: Cell<bool>,
    owner: Cell<GreenId>,
    waiters: RefCell<IdQueue>,
    value: UnsafeCell<T>,
}

impl<T> Mutex<T> {
    pub fn new(rt: &Runtime, value: T) -> Self {
        Self {
            rt: rt.clone(),
            held: Cell::new(false),
            owner: Cell::new(GreenId::NONE),
            waiters: RefCell::new(IdQueue::new()),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, waiting in FIFO order if it is held
    ///
    /// Locking a mutex the caller already holds never returns.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let sched = self.rt.sched();
        let _cs = sched.critical();
        self.acquire_locked(sched);
        MutexGuard { mutex: self }
    }

    /// Acquire the lock only if it is free
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let sched = self.rt.sched();
        let _cs = sched.critical();
        if self.held.get() {
            return None;
        }
        self.held.set(true);
        self.owner.set(sched.current());
        Some(MutexGuard { mutex: self })
    }

    pub fn is_locked(&self) -> bool {
        self.held.get()
    }

    /// Thread holding the lock (or handed it and not yet resumed)
    pub fn owner(&self) -> Option<GreenId> {
        if self.held.get() {
            self.owner.get().to_option()
        } else {
            None
        }
    }

    /// Threads queued on the lock
    pub fn waiting(&self) -> usize {
        let _cs = self.rt.sched().critical();
        self.waiters.borrow().len()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.rt
    }

    /// Take the lock for the running thread, parking until handed over
    ///
    /// Called inside a critical section.
    pub(crate) fn acquire_locked(&self, sched: &Scheduler) {
        let me = sched.current();
        if !self.held.get() {
            self.held.set(true);
            self.owner.set(me);
            return;
        }
        self.waiters.borrow_mut().push(me);
        sched.suspend(QueueKind::MutexWait);
        // Resumed by release_locked, which made us the owner
        debug_assert_eq!(self.owner.get(), me);
    }

    /// Release the lock, handing it to the first waiter if any
    ///
    /// Called inside a critical section.
    pub(crate) fn release_locked(&self, sched: &Scheduler) {
        let next = self.waiters.borrow_mut().pop();
        match next {
            Some(next) => {
                self.owner.set(next);
                sched.wake(next, QueueKind::MutexWait);
            }
            None => {
                self.held.set(false);
                self.owner.set(GreenId::NONE);
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("held", &self.held.get())
            .field("owner", &self.owner())
            .field("waiting", &self.waiters.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Proof of holding a [`Mutex`]; unlocks on drop
#[must_use = "the mutex is unlocked as soon as the guard is dropped"]
pub struct MutexGuard<'a, T> {
    pub(crate) mutex: &'a Mutex<T>,
}

impl<'a, T> MutexGuard<'a, T> {
    /// Explicit unlock, same as dropping the guard
    pub fn unlock(self) {
        drop(self);
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        let sched = self.mutex.rt.sched();
        let _cs = sched.critical();
        self.mutex.release_locked(sched);
    }
}
