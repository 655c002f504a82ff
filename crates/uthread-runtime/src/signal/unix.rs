//! Unix signal handling for SIGVTALRM preemption

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use crate::scheduler::fatal;
use uthread_core::error::{SchedError, SchedResult};

/// Signal used for preemption ticks
pub const PREEMPT_SIGNAL: Signal = Signal::SIGVTALRM;

static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

fn preempt_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(PREEMPT_SIGNAL);
    set
}

/// Install the process-wide SIGVTALRM handler (once)
///
/// Ticks that reach an OS thread without a runtime are ignored by the
/// handler, so installing it early is harmless.
pub fn install_preempt_handler() -> SchedResult<()> {
    if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let action = SigAction::new(
        SigHandler::Handler(on_preempt_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    if let Err(errno) = unsafe { sigaction(PREEMPT_SIGNAL, &action) } {
        HANDLER_INSTALLED.store(false, Ordering::SeqCst);
        return Err(SchedError::PlatformError(errno as i32));
    }
    Ok(())
}

extern "C" fn on_preempt_signal(_sig: libc::c_int) {
    crate::scheduler::preempt_tick();
}

/// Unblock the preemption signal on this OS thread
#[inline]
pub fn unmask() {
    if let Err(errno) = preempt_set().thread_unblock() {
        fatal(format_args!("unblocking {:?} failed: {}", PREEMPT_SIGNAL, errno));
    }
}

/// Whether the preemption signal is blocked on this OS thread
pub fn is_masked() -> bool {
    SigSet::thread_get_mask()
        .map(|mask| mask.contains(PREEMPT_SIGNAL))
        .unwrap_or(false)
}

/// Whether the mask returned by a block request still let the signal through
fn was_unblocked(old: nix::Result<SigSet>) -> nix::Result<bool> {
    old.map(|old| !old.contains(PREEMPT_SIGNAL))
}

/// Scoped block of the preemption signal
///
/// Nests: only the outermost section (the one that found the signal
/// unblocked) unblocks it again on drop. An inactive section, used when
/// preemption is off, makes no system calls.
#[must_use = "the signal is unblocked again when the guard drops"]
pub struct CriticalSection {
    unmask_on_exit: bool,
    // Mask state belongs to the OS thread
    _not_send: PhantomData<*const ()>,
}

impl CriticalSection {
    #[inline]
    pub fn enter(active: bool) -> Self {
        let unmask_on_exit = active
            && match was_unblocked(preempt_set().thread_swap_mask(SigmaskHow::SIG_BLOCK)) {
                Ok(outermost) => outermost,
                // Running on unmasked would let a tick into scheduler state
                Err(errno) => fatal(format_args!("blocking {:?} failed: {}", PREEMPT_SIGNAL, errno)),
            };
        Self {
            unmask_on_exit,
            _not_send: PhantomData,
        }
    }

    /// Whether leaving this section re-enables preemption
    #[inline]
    pub fn is_outermost(&self) -> bool {
        self.unmask_on_exit
    }
}

impl Drop for CriticalSection {
    #[inline]
    fn drop(&mut self) {
        if self.unmask_on_exit {
            unmask();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_section_nesting() {
        unmask();
        assert!(!is_masked());
        {
            let outer = CriticalSection::enter(true);
            assert!(outer.is_outermost());
            assert!(is_masked());
            {
                let inner = CriticalSection::enter(true);
                assert!(!inner.is_outermost());
                assert!(is_masked());
            }
            // Inner exit leaves the outer section intact
            assert!(is_masked());
        }
        assert!(!is_masked());
    }

    #[test]
    fn test_inactive_section_is_noop() {
        unmask();
        let cs = CriticalSection::enter(false);
        assert!(!cs.is_outermost());
        assert!(!is_masked());
    }

    #[test]
    fn test_failed_block_is_reported() {
        use nix::errno::Errno;

        assert_eq!(was_unblocked(Err(Errno::EINVAL)), Err(Errno::EINVAL));
        assert_eq!(was_unblocked(Ok(SigSet::empty())), Ok(true));
        assert_eq!(was_unblocked(Ok(preempt_set())), Ok(false));
    }

    #[test]
    fn test_unmask_clears_block() {
        let _ = preempt_set().thread_block();
        assert!(is_masked());
        unmask();
        assert!(!is_masked());
    }

    #[test]
    fn test_install_is_idempotent() {
        install_preempt_handler().unwrap();
        install_preempt_handler().unwrap();
    }
}
