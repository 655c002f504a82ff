//! Public runtime handle
//!
//! ```rust,ignore
//! use uthread_runtime::{Runtime, RuntimeConfig};
//!
//! let rt = Runtime::new(RuntimeConfig::from_env())?;
//! let h = rt.spawn(|n: u32| n * 10, 4)?;
//! assert_eq!(rt.join(h)?, 40);
//! ```
//!
//! # Preemption and non-reentrant code
//!
//! With a non-zero preemption period any green thread can be switched out
//! between two instructions, including inside `malloc` or while holding the
//! stdout lock. Another green thread entering the same code on the same OS
//! thread would then deadlock or corrupt it. Wrap such calls in
//! [`Runtime::without_preemption`].

use crate::config::RuntimeConfig;
use crate::scheduler::Scheduler;
use crate::tls;

use uthread_core::error::{SchedError, SchedResult};
use uthread_core::id::GreenId;
use uthread_core::kprint::{self, LogLevel};
use uthread_core::kinfo;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Handle to the green-thread runtime of the calling OS thread
///
/// Cheap to clone; the runtime lives until the last handle is dropped.
/// Every thread must be joined before that happens.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<Scheduler>,
}

impl Runtime {
    /// Start a runtime on the calling OS thread
    ///
    /// The caller becomes the main green thread. Fails with
    /// `AlreadyInitialized` if this OS thread already has a live runtime.
    pub fn new(config: RuntimeConfig) -> SchedResult<Self> {
        config.validate()?;
        if tls::has_runtime() {
            return Err(SchedError::AlreadyInitialized);
        }
        if config.debug_logging && kprint::log_level() < LogLevel::Debug {
            kprint::set_log_level(LogLevel::Debug);
        }

        let inner = Rc::new(Scheduler::new(config)?);
        tls::set_runtime(Rc::as_ptr(&inner));
        kprint::set_green_id(GreenId::MAIN.as_u32());
        // On failure dropping `inner` unregisters it again
        inner.start_preemption()?;

        kinfo!(
            "runtime {} started: stack {} bytes, preemption {}",
            inner.id(),
            inner.config().stack_size,
            if inner.preemption_enabled() {
                format!("every {:?}", inner.config().preempt_period)
            } else {
                "off".to_string()
            }
        );
        Ok(Self { inner })
    }

    #[inline]
    pub(crate) fn sched(&self) -> &Scheduler {
        &self.inner
    }

    /// Create a green thread running `f(arg)`
    ///
    /// The thread is appended to the ready queue; control stays with the
    /// caller.
    pub fn spawn<F, A, R>(&self, f: F, arg: A) -> SchedResult<JoinHandle<R>>
    where
        F: FnOnce(A) -> R + 'static,
        A: 'static,
        R: 'static,
    {
        let _cs = self.inner.critical();
        let result = Rc::new(Cell::new(None));
        let slot = Rc::clone(&result);
        let mut payload = Some((f, arg));
        let entry = move || {
            if let Some((f, arg)) = payload.take() {
                slot.set(Some(f(arg)));
            }
        };

        let (id, generation) = self.inner.spawn_entry(entry)?;
        Ok(JoinHandle {
            id,
            generation,
            runtime_id: self.inner.id(),
            result,
        })
    }

    /// Give the CPU to the next ready thread
    ///
    /// Returns immediately when no other thread is ready.
    pub fn yield_now(&self) {
        self.inner.yield_now();
    }

    /// Wait for a thread to finish and return its result
    ///
    /// The thread's stack and slot are released exactly once, here.
    pub fn join<R>(&self, handle: JoinHandle<R>) -> SchedResult<R> {
        let panicked = self
            .inner
            .join_thread(handle.id, handle.generation, handle.runtime_id)?;

        let value = {
            let _cs = self.inner.critical();
            let value = handle.result.take();
            drop(handle);
            value
        };
        if panicked {
            return Err(SchedError::ThreadPanicked);
        }
        value.ok_or(SchedError::ThreadPanicked)
    }

    /// Id of the running green thread
    #[inline]
    pub fn current(&self) -> GreenId {
        self.inner.current()
    }

    /// Whether the thread behind `handle` has returned
    pub fn is_finished<R>(&self, handle: &JoinHandle<R>) -> bool {
        handle.runtime_id == self.inner.id() && self.inner.is_finished(handle.id, handle.generation)
    }

    /// Threads waiting in the ready queue
    pub fn ready_len(&self) -> usize {
        self.inner.ready_len()
    }

    pub fn stats(&self) -> RuntimeStats {
        self.inner.stats()
    }

    /// Run `f` with preemption held off
    ///
    /// Use it around code that must not be re-entered from another green
    /// thread: stdio, the allocator, anything holding a process-wide lock.
    /// Blocking runtime calls inside `f` still switch threads.
    pub fn without_preemption<T>(&self, f: impl FnOnce() -> T) -> T {
        let _cs = self.inner.critical();
        f()
    }

    #[inline]
    pub fn preemption_enabled(&self) -> bool {
        self.inner.preemption_enabled()
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        self.inner.config()
    }

    /// Whether two handles refer to the same runtime
    #[inline]
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id())
            .field("current", &self.inner.current())
            .finish()
    }
}

/// Owned permission to join a green thread and take its result
///
/// Consumed by [`Runtime::join`]. Dropping it without joining keeps the
/// thread's resources until the runtime itself is dropped.
#[must_use = "a thread that is never joined keeps its stack until the runtime is dropped"]
pub struct JoinHandle<R> {
    pub(crate) id: GreenId,
    pub(crate) generation: u32,
    pub(crate) runtime_id: u64,
    result: Rc<Cell<Option<R>>>,
}

impl<R> JoinHandle<R> {
    #[inline]
    pub fn id(&self) -> GreenId {
        self.id
    }
}

impl<R> fmt::Debug for JoinHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Runtime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub spawned: u64,
    pub joined: u64,
    pub context_switches: u64,
    /// Voluntary yields
    pub yields: u64,
    /// Timer ticks handled
    pub preemptions: u64,
    /// Threads not yet joined, main included
    pub live_threads: usize,
    pub cached_stacks: usize,
}

impl fmt::Display for RuntimeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "spawned={} joined={} live={} switches={} yields={} preemptions={} cached_stacks={}",
            self.spawned,
            self.joined,
            self.live_threads,
            self.context_switches,
            self.yields,
            self.preemptions,
            self.cached_stacks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    fn cooperative() -> Runtime {
        Runtime::new(RuntimeConfig::new().preempt_period(Duration::ZERO)).unwrap()
    }

    fn preemptive() -> Runtime {
        Runtime::new(RuntimeConfig::new().preempt_period(Duration::from_micros(100))).unwrap()
    }

    #[test]
    fn test_yield_round_robin() {
        let rt = cooperative();
        let log = Rc::new(RefCell::new(Vec::new()));

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let rt2 = rt.clone();
                let log = Rc::clone(&log);
                rt.spawn(
                    move |i: u32| {
                        for _ in 0..3 {
                            log.borrow_mut().push(i);
                            rt2.yield_now();
                        }
                    },
                    i,
                )
                .unwrap()
            })
            .collect();

        for h in handles {
            rt.join(h).unwrap();
        }
        assert_eq!(*log.borrow(), vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_join_finished_threads_in_reverse() {
        let rt = cooperative();
        let h1 = rt.spawn(|x: u32| x * 10, 1).unwrap();
        let h2 = rt.spawn(|x: u32| x * 10, 2).unwrap();
        assert!(!rt.is_finished(&h1));

        // Both run to completion before main gets the CPU back
        rt.yield_now();
        assert!(rt.is_finished(&h1));
        assert!(rt.is_finished(&h2));
        assert_eq!(rt.ready_len(), 0);

        assert_eq!(rt.join(h2), Ok(20));
        assert_eq!(rt.join(h1), Ok(10));
    }

    #[test]
    fn test_join_waits_for_unfinished_thread() {
        let rt = cooperative();
        let h = rt
            .spawn(
                |rt: Runtime| {
                    for _ in 0..5 {
                        rt.yield_now();
                    }
                    String::from("done")
                },
                rt.clone(),
            )
            .unwrap();
        assert_eq!(rt.join(h).unwrap(), "done");
    }

    #[test]
    fn test_panicking_thread_is_reported_and_released() {
        let rt = cooperative();
        let h = rt.spawn(|_: ()| -> u32 { panic!("boom") }, ()).unwrap();
        assert_eq!(rt.join(h), Err(SchedError::ThreadPanicked));

        let stats = rt.stats();
        assert_eq!(stats.live_threads, 1);
        assert_eq!(stats.joined, 1);

        // The runtime keeps working
        let h = rt.spawn(|x: u32| x + 1, 41).unwrap();
        assert_eq!(rt.join(h), Ok(42));
    }

    #[test]
    fn test_join_self_rejected() {
        let rt = cooperative();
        let own: Rc<RefCell<Option<JoinHandle<()>>>> = Rc::new(RefCell::new(None));
        let seen: Rc<Cell<Option<SchedError>>> = Rc::new(Cell::new(None));

        let h = {
            let own = Rc::clone(&own);
            let seen = Rc::clone(&seen);
            rt.spawn(
                move |rt: Runtime| {
                    if let Some(me) = own.borrow_mut().take() {
                        seen.set(rt.join(me).err());
                    }
                },
                rt.clone(),
            )
            .unwrap()
        };
        *own.borrow_mut() = Some(h);

        rt.yield_now();
        assert_eq!(seen.take(), Some(SchedError::JoinSelf));
    }

    #[test]
    fn test_slots_and_stacks_recycled() {
        let rt = cooperative();
        let mut ids = Vec::new();
        for n in 0..10u32 {
            let h = rt.spawn(|n: u32| n, n).unwrap();
            ids.push(h.id());
            assert_eq!(rt.join(h), Ok(n));
        }
        // LIFO slot reuse: the same slot every time
        assert!(ids.iter().all(|&id| id == ids[0]));

        let stats = rt.stats();
        assert_eq!(stats.spawned, 10);
        assert_eq!(stats.joined, 10);
        assert_eq!(stats.live_threads, 1);
        assert_eq!(stats.cached_stacks, 1);
    }

    #[test]
    fn test_thread_limit() {
        let rt = Runtime::new(RuntimeConfig::new().preempt_period(Duration::ZERO).max_threads(2)).unwrap();
        let h = rt.spawn(|_: ()| (), ()).unwrap();
        assert!(matches!(rt.spawn(|_: ()| (), ()), Err(SchedError::NoSlotsAvailable)));
        rt.join(h).unwrap();
        let h = rt.spawn(|_: ()| (), ()).unwrap();
        rt.join(h).unwrap();
    }

    #[test]
    fn test_one_runtime_per_os_thread() {
        let rt = cooperative();
        assert!(matches!(
            Runtime::new(RuntimeConfig::new().preempt_period(Duration::ZERO)),
            Err(SchedError::AlreadyInitialized)
        ));
        drop(rt);

        // Dropping the last handle frees the OS thread for a new runtime
        let rt = cooperative();
        assert_eq!(rt.current(), GreenId::MAIN);
    }

    #[test]
    fn test_handle_from_previous_runtime_rejected() {
        let rt = cooperative();
        let stale = rt.spawn(|_: ()| 7u8, ()).unwrap();
        drop(rt);

        let rt = cooperative();
        assert_eq!(rt.join(stale), Err(SchedError::InvalidHandle));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Runtime::new(RuntimeConfig::new().stack_size(1024)).unwrap_err();
        assert!(matches!(err, SchedError::InvalidConfig(_)));
        assert!(!tls::has_runtime());
    }

    #[test]
    fn test_stats_count_switches_and_yields() {
        let rt = cooperative();
        let h = rt.spawn(|rt: Runtime| rt.yield_now(), rt.clone()).unwrap();
        rt.yield_now();
        rt.join(h).unwrap();

        let stats = rt.stats();
        assert_eq!(stats.yields, 2);
        // main -> g1, g1 -> main, main -> g1, g1 -> main (exit)
        assert_eq!(stats.context_switches, 4);
        assert_eq!(stats.preemptions, 0);
        assert!(!rt.preemption_enabled());
    }

    #[test]
    fn test_preemption_lets_other_thread_run() {
        let rt = preemptive();
        assert!(rt.preemption_enabled());
        let flag = Rc::new(AtomicBool::new(false));

        let spinner = rt
            .spawn(
                |flag: Rc<AtomicBool>| {
                    // Never yields: only a timer tick can let the setter in
                    let deadline = Instant::now() + Duration::from_secs(10);
                    while !flag.load(Ordering::SeqCst) {
                        if Instant::now() > deadline {
                            return false;
                        }
                    }
                    true
                },
                Rc::clone(&flag),
            )
            .unwrap();
        let setter = rt
            .spawn(|flag: Rc<AtomicBool>| flag.store(true, Ordering::SeqCst), Rc::clone(&flag))
            .unwrap();

        assert_eq!(rt.join(spinner), Ok(true));
        rt.join(setter).unwrap();
        assert!(rt.stats().preemptions > 0);
    }

    #[test]
    fn test_without_preemption_blocks_ticks() {
        let rt = preemptive();
        rt.without_preemption(|| {
            assert!(crate::signal::is_masked());
        });
        assert!(!crate::signal::is_masked());
    }
}
