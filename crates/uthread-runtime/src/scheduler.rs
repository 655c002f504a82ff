//! Scheduler core
//!
//! Owns every thread record, the ready queue and the id of the running
//! thread. All green threads of a runtime share one OS thread, so "running"
//! is a single value and every transfer of control goes through
//! [`Scheduler::switch_to`] or [`Scheduler::replace_with`].
//!
//! # Discipline
//!
//! Anything that reads or writes `state` does so inside a
//! [`CriticalSection`], which keeps the preemption handler out. A
//! `RefCell` borrow is never held across a context switch.
//!
//! Allocation and deallocation done on behalf of the runtime (records,
//! boxed entry closures, stacks) also happens inside critical sections: a
//! tick landing inside the allocator would otherwise let another green
//! thread re-enter it.

use crate::arch::{self, SavedRegs};
use crate::config::RuntimeConfig;
use crate::memory::{Stack, StackPool};
use crate::ready_queue::{FifoQueue, ReadyQueue};
use crate::runtime::RuntimeStats;
use crate::signal::{self, CriticalSection};
use crate::timer::PreemptTimer;
use crate::tls;

use uthread_core::error::{SchedError, SchedResult};
use uthread_core::id::GreenId;
use uthread_core::slot::SlotAllocator;
use uthread_core::state::{QueueKind, ThreadState};
use uthread_core::{kdebug, kerror, kinfo, kprint, kwarn};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Log and abort. Used for broken scheduler invariants, where continuing
/// would run a thread on a corrupted queue or resume a dead context.
#[cold]
pub(crate) fn fatal(args: fmt::Arguments<'_>) -> ! {
    kerror!("fatal: {}", args);
    std::process::abort()
}

/// Per-thread bookkeeping
pub(crate) struct ThreadRecord {
    /// Boxed so the address handed to the switch routine is stable
    regs: Box<SavedRegs>,
    /// `None` for the main thread, which runs on the OS thread's stack
    stack: Option<Stack>,
    entry: Option<Box<dyn FnMut()>>,
    state: ThreadState,
    queued: Option<QueueKind>,
    joiner: Option<GreenId>,
    generation: u32,
    panicked: bool,
}

impl ThreadRecord {
    fn main() -> Self {
        Self {
            regs: Box::default(),
            stack: None,
            entry: None,
            state: ThreadState::Running,
            queued: None,
            joiner: None,
            generation: 0,
            panicked: false,
        }
    }
}

/// Everything behind the scheduler's `RefCell`
pub(crate) struct SchedState {
    threads: Vec<Option<ThreadRecord>>,
    slots: SlotAllocator,
    ready: Box<dyn ReadyQueue>,
    stacks: StackPool,
}

impl SchedState {
    fn record(&self, id: GreenId) -> Option<&ThreadRecord> {
        self.threads.get(id.index()).and_then(Option::as_ref)
    }

    fn record_mut(&mut self, id: GreenId) -> &mut ThreadRecord {
        match self.threads.get_mut(id.index()).and_then(Option::as_mut) {
            Some(rec) => rec,
            None => fatal(format_args!("no thread record for {}", id)),
        }
    }

    /// Tag `id` as sitting in a queue of `kind`
    fn park(&mut self, id: GreenId, kind: QueueKind) {
        let rec = self.record_mut(id);
        if let Some(current) = rec.queued {
            fatal(format_args!("{} queued on {} while already on {}", id, kind, current));
        }
        if rec.state.is_finished() {
            fatal(format_args!("finished thread {} queued on {}", id, kind));
        }
        rec.queued = Some(kind);
        rec.state = ThreadState::Runnable;
    }

    /// Clear the tag of a thread just taken off a queue of `kind`
    fn unpark(&mut self, id: GreenId, kind: QueueKind) {
        let rec = self.record_mut(id);
        if rec.queued != Some(kind) {
            fatal(format_args!("{} taken off {} but tagged {:?}", id, kind, rec.queued));
        }
        rec.queued = None;
    }

    fn make_ready(&mut self, id: GreenId) {
        self.park(id, QueueKind::Ready);
        self.ready.push(id);
    }

    /// Move a thread from a wait list of `kind` to the ready tail
    fn wake(&mut self, id: GreenId, kind: QueueKind) {
        self.unpark(id, kind);
        self.make_ready(id);
    }

    fn next_ready(&mut self) -> Option<GreenId> {
        let id = self.ready.pop()?;
        self.unpark(id, QueueKind::Ready);
        Some(id)
    }

    fn live_threads(&self) -> usize {
        self.slots.allocated_count() as usize
    }
}

#[derive(Debug, Default)]
struct Counters {
    spawned: Cell<u64>,
    joined: Cell<u64>,
    switches: Cell<u64>,
    yields: Cell<u64>,
    preemptions: Cell<u64>,
}

#[inline]
fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

/// Scheduler for the green threads of one OS thread
pub struct Scheduler {
    id: u64,
    config: RuntimeConfig,
    preempt: bool,
    state: RefCell<SchedState>,
    running: Cell<GreenId>,
    /// Set between leaving one context and entering the next
    switching: Cell<bool>,
    stats: Counters,
    timer: RefCell<Option<PreemptTimer>>,
}

impl Scheduler {
    /// Create a scheduler whose running thread is the caller (main)
    pub(crate) fn new(config: RuntimeConfig) -> SchedResult<Self> {
        let mut slots = SlotAllocator::new(config.max_threads);
        let (main, _) = slots.allocate()?;
        debug_assert!(main.is_main());

        let mut threads = Vec::with_capacity(uthread_core::constants::QUEUE_PREALLOC);
        threads.push(Some(ThreadRecord::main()));

        let state = SchedState {
            threads,
            slots,
            ready: Box::new(FifoQueue::new()),
            stacks: StackPool::new(config.stack_size, config.stack_cache),
        };

        Ok(Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            preempt: config.preemption_enabled(),
            config,
            state: RefCell::new(state),
            running: Cell::new(GreenId::MAIN),
            switching: Cell::new(false),
            stats: Counters::default(),
            timer: RefCell::new(None),
        })
    }

    /// Install the handler and arm the timer (no-op if preemption is off)
    ///
    /// Must run after `self` is registered in [`tls`].
    pub(crate) fn start_preemption(&self) -> SchedResult<()> {
        if !self.preempt {
            return Ok(());
        }
        signal::install_preempt_handler()?;
        let timer = PreemptTimer::start(self.config.preempt_period)?;
        *self.timer.borrow_mut() = Some(timer);
        Ok(())
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn preemption_enabled(&self) -> bool {
        self.preempt
    }

    #[inline]
    pub(crate) fn critical(&self) -> CriticalSection {
        CriticalSection::enter(self.preempt)
    }

    #[inline]
    pub(crate) fn current(&self) -> GreenId {
        self.running.get()
    }

    // ------------------------------------------------------------------
    // Thread creation and completion
    // ------------------------------------------------------------------

    /// Create a thread running `entry` and append it to the ready queue
    pub(crate) fn spawn_entry<F>(&self, entry: F) -> SchedResult<(GreenId, u32)>
    where
        F: FnMut() + 'static,
    {
        let _cs = self.critical();
        let entry: Box<dyn FnMut()> = Box::new(entry);
        let mut st = self.state.borrow_mut();

        let (id, generation) = st.slots.allocate()?;
        let stack = match st.stacks.take() {
            Ok(stack) => stack,
            Err(e) => {
                st.slots.release(id);
                return Err(e.into());
            }
        };

        let mut regs: Box<SavedRegs> = Box::default();
        unsafe {
            arch::init_context(&mut regs, stack.top(), green_entry, self as *const Scheduler as usize);
        }

        let idx = id.index();
        if idx >= st.threads.len() {
            st.threads.resize_with(idx + 1, || None);
        }
        st.threads[idx] = Some(ThreadRecord {
            regs,
            stack: Some(stack),
            entry: Some(entry),
            state: ThreadState::Runnable,
            queued: None,
            joiner: None,
            generation,
            panicked: false,
        });

        let live = st.live_threads();
        st.ready.reserve(live);
        st.make_ready(id);
        bump(&self.stats.spawned);

        if self.config.debug_logging {
            kdebug!("spawned {} (gen {}), {} live", id, generation, live);
        }
        Ok((id, generation))
    }

    /// Run the running thread's entry closure to completion
    ///
    /// Returns whether it panicked.
    fn run_entry(&self) -> bool {
        let id = self.running.get();
        let entry = {
            let _cs = self.critical();
            self.state.borrow_mut().record_mut(id).entry.take()
        };
        let Some(mut entry) = entry else {
            return false;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry()));

        let cs = self.critical();
        drop(entry);
        let panicked = outcome.is_err();
        drop(outcome);
        drop(cs);
        panicked
    }

    /// Retire the running thread and hand the CPU to the next ready one
    fn finish_current(&self, panicked: bool) -> ! {
        // Left blocked: the resumed context restores its own mask.
        let _cs = self.critical();
        let me = self.running.get();

        let next = {
            let mut st = self.state.borrow_mut();
            let rec = st.record_mut(me);
            rec.state = ThreadState::Finished;
            rec.panicked = panicked;
            if let Some(joiner) = rec.joiner.take() {
                st.wake(joiner, QueueKind::Join);
            }
            st.next_ready()
        };

        match next {
            Some(next) => self.replace_with(next),
            None => fatal(format_args!(
                "{} finished with every other thread blocked",
                me
            )),
        }
    }

    // ------------------------------------------------------------------
    // Switching
    // ------------------------------------------------------------------

    /// Suspend the running thread and resume `next`
    ///
    /// Must be called inside a critical section with the running thread
    /// already placed wherever it should wait (ready queue or a wait list).
    /// Returns once some later switch resumes the caller.
    pub(crate) fn switch_to(&self, next: GreenId) {
        let me = self.running.get();
        let (old, new) = {
            let mut st = self.state.borrow_mut();
            if next == me {
                st.record_mut(me).state = ThreadState::Running;
                return;
            }
            let outgoing = st.record_mut(me);
            if outgoing.state.is_running() {
                outgoing.state = ThreadState::Runnable;
            }
            let old: *mut SavedRegs = &mut *outgoing.regs;

            let incoming = st.record_mut(next);
            incoming.state = ThreadState::Running;
            let new: *const SavedRegs = &*incoming.regs;
            (old, new)
        };

        self.enter(next);
        unsafe {
            arch::context_switch(old, new);
        }
        self.switching.set(false);
    }

    /// Resume `next`, abandoning the running context for good
    pub(crate) fn replace_with(&self, next: GreenId) -> ! {
        let new = {
            let mut st = self.state.borrow_mut();
            let incoming = st.record_mut(next);
            incoming.state = ThreadState::Running;
            &*incoming.regs as *const SavedRegs
        };

        self.enter(next);
        unsafe { arch::context_jump(new) }
    }

    #[inline]
    fn enter(&self, next: GreenId) {
        if self.switching.replace(true) {
            fatal(format_args!("nested context switch into {}", next));
        }
        self.running.set(next);
        bump(&self.stats.switches);
        kprint::set_green_id(next.as_u32());
    }

    /// Park the running thread (tagged `kind`) and run the ready head
    ///
    /// The caller has already appended the thread to its wait list.
    pub(crate) fn suspend(&self, kind: QueueKind) {
        let me = self.running.get();
        let next = {
            let mut st = self.state.borrow_mut();
            st.park(me, kind);
            st.next_ready()
        };
        match next {
            Some(next) => self.switch_to(next),
            None => fatal(format_args!(
                "{} blocked on {} with no runnable thread left",
                me, kind
            )),
        }
    }

    /// Move a waiter back to the ready tail
    pub(crate) fn wake(&self, id: GreenId, kind: QueueKind) {
        self.state.borrow_mut().wake(id, kind);
    }

    /// Requeue the running thread and switch straight to `target`, which
    /// was just taken off a wait list of `kind`
    pub(crate) fn hand_off(&self, target: GreenId, kind: QueueKind) {
        let me = self.running.get();
        {
            let mut st = self.state.borrow_mut();
            st.unpark(target, kind);
            st.make_ready(me);
        }
        self.switch_to(target);
    }

    // ------------------------------------------------------------------
    // Yield and preemption
    // ------------------------------------------------------------------

    pub(crate) fn yield_now(&self) {
        let _cs = self.critical();
        bump(&self.stats.yields);
        self.yield_locked();
    }

    /// Requeue the running thread at the tail and run the head
    fn yield_locked(&self) {
        let me = self.running.get();
        let next = {
            let mut st = self.state.borrow_mut();
            st.make_ready(me);
            st.next_ready()
        };
        match next {
            Some(next) => self.switch_to(next),
            None => fatal(format_args!("ready queue empty after requeueing {}", me)),
        }
    }

    // ------------------------------------------------------------------
    // Join
    // ------------------------------------------------------------------

    /// Wait for `target` to finish, then release it
    ///
    /// Returns whether its entry panicked.
    pub(crate) fn join_thread(&self, target: GreenId, generation: u32, runtime_id: u64) -> SchedResult<bool> {
        let _cs = self.critical();
        if runtime_id != self.id {
            return Err(SchedError::InvalidHandle);
        }
        let me = self.running.get();

        let must_wait = {
            let mut st = self.state.borrow_mut();
            let rec = match st.threads.get_mut(target.index()).and_then(Option::as_mut) {
                Some(rec) if rec.generation == generation => rec,
                _ => return Err(SchedError::InvalidHandle),
            };
            if target == me {
                return Err(SchedError::JoinSelf);
            }
            if rec.state.is_finished() {
                false
            } else {
                if rec.joiner.is_some() {
                    return Err(SchedError::JoinerPresent);
                }
                rec.joiner = Some(me);
                true
            }
        };

        if must_wait {
            self.suspend(QueueKind::Join);
        }

        let mut st = self.state.borrow_mut();
        let rec = match st.threads.get_mut(target.index()).and_then(Option::take) {
            Some(rec) if rec.state.is_finished() => rec,
            _ => fatal(format_args!("{} woke from join before {} finished", me, target)),
        };
        if let Some(stack) = rec.stack {
            st.stacks.give(stack);
        }
        st.slots.release(target);
        bump(&self.stats.joined);

        if self.config.debug_logging {
            kdebug!("joined {} (panicked: {}), {} live", target, rec.panicked, st.live_threads());
        }
        Ok(rec.panicked)
    }

    pub(crate) fn is_finished(&self, target: GreenId, generation: u32) -> bool {
        let _cs = self.critical();
        let st = self.state.borrow();
        st.record(target)
            .filter(|rec| rec.generation == generation)
            .map(|rec| rec.state.is_finished())
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub(crate) fn ready_len(&self) -> usize {
        let _cs = self.critical();
        self.state.borrow().ready.len()
    }

    pub(crate) fn stats(&self) -> RuntimeStats {
        let _cs = self.critical();
        let st = self.state.borrow();
        RuntimeStats {
            spawned: self.stats.spawned.get(),
            joined: self.stats.joined.get(),
            context_switches: self.stats.switches.get(),
            yields: self.stats.yields.get(),
            preemptions: self.stats.preemptions.get(),
            live_threads: st.live_threads(),
            cached_stacks: st.stacks.cached(),
        }
    }

    #[cfg(test)]
    pub(crate) fn queued_on(&self, id: GreenId) -> Option<QueueKind> {
        let _cs = self.critical();
        self.state.borrow().record(id).and_then(|rec| rec.queued)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _cs = CriticalSection::enter(self.preempt);
        self.timer.get_mut().take();
        tls::clear_runtime(self as *const Scheduler);

        let running = self.running.get();
        if !running.is_main() {
            fatal(format_args!(
                "runtime dropped while {} was running; join threads before dropping the last handle",
                running
            ));
        }

        let live = self.state.get_mut().live_threads();
        if live > 1 {
            kwarn!("runtime {} dropped with {} unjoined threads", self.id, live - 1);
        }
        kinfo!(
            "runtime {} shut down: {} spawned, {} switches, {} preemptions",
            self.id,
            self.stats.spawned.get(),
            self.stats.switches.get(),
            self.stats.preemptions.get()
        );
        kprint::clear_green_id();
    }
}

/// First Rust frame of every green thread
extern "C" fn green_entry(sched: usize) -> ! {
    let sched = unsafe { &*(sched as *const Scheduler) };
    sched.switching.set(false);
    if sched.preempt {
        // Switched in from inside someone else's critical section
        signal::unmask();
    }
    let panicked = sched.run_entry();
    sched.finish_current(panicked)
}

/// Preemption tick, called from the signal handler
pub(crate) fn preempt_tick() {
    let ptr = tls::current_runtime();
    if ptr.is_null() {
        return;
    }
    let sched = unsafe { &*ptr };
    if sched.switching.get() || sched.state.try_borrow_mut().is_err() {
        return;
    }
    let _cs = sched.critical();
    bump(&sched.stats.preemptions);
    sched.yield_locked();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use std::time::Duration;

    fn cooperative() -> Runtime {
        Runtime::new(RuntimeConfig::new().preempt_period(Duration::ZERO)).unwrap()
    }

    #[test]
    fn test_main_is_running_and_alone() {
        let rt = cooperative();
        let sched = rt.sched();
        assert_eq!(sched.current(), GreenId::MAIN);
        assert_eq!(sched.ready_len(), 0);

        // Yielding with nothing else ready keeps running main
        rt.yield_now();
        assert_eq!(sched.current(), GreenId::MAIN);
        assert_eq!(sched.queued_on(GreenId::MAIN), None);
        assert_eq!(rt.stats().context_switches, 0);
    }

    #[test]
    fn test_queue_tags_follow_thread() {
        let rt = cooperative();
        let sched = rt.sched();
        let h = rt.spawn(|rt: Runtime| rt.yield_now(), rt.clone()).unwrap();
        let id = h.id();
        assert_eq!(sched.queued_on(id), Some(QueueKind::Ready));

        // g1 runs, yields back behind main
        rt.yield_now();
        assert_eq!(sched.queued_on(id), Some(QueueKind::Ready));
        assert_eq!(sched.queued_on(GreenId::MAIN), None);

        rt.join(h).unwrap();
        assert_eq!(sched.queued_on(id), None);
    }

    #[test]
    fn test_second_joiner_rejected() {
        let rt = cooperative();
        let sched = rt.sched();
        let rid = sched.id();

        let target = rt
            .spawn(
                |rt: Runtime| {
                    for _ in 0..3 {
                        rt.yield_now();
                    }
                },
                rt.clone(),
            )
            .unwrap();
        let (tid, tgen) = (target.id(), target.generation);

        let waiter = rt
            .spawn(move |rt: Runtime| rt.sched().join_thread(tid, tgen, rid), rt.clone())
            .unwrap();

        // target yields once, waiter parks on target
        rt.yield_now();
        assert_eq!(sched.queued_on(waiter.id()), Some(QueueKind::Join));
        assert_eq!(sched.join_thread(tid, tgen, rid), Err(SchedError::JoinerPresent));

        // The waiter performed the join and released target
        assert_eq!(rt.join(waiter), Ok(Ok(false)));
        assert_eq!(rt.join(target), Err(SchedError::InvalidHandle));
        assert_eq!(rt.stats().live_threads, 1);
    }

    #[test]
    fn test_foreign_runtime_id_rejected() {
        let rt = cooperative();
        let sched = rt.sched();
        assert_eq!(
            sched.join_thread(GreenId::MAIN, 0, sched.id() + 1000),
            Err(SchedError::InvalidHandle)
        );
        assert_eq!(sched.join_thread(GreenId::MAIN, 0, sched.id()), Err(SchedError::JoinSelf));
    }
}
