//! Signal handling for preemption
//!
//! The preemption timer raises `SIGVTALRM`; the handler turns it into an
//! involuntary yield. Scheduler state is only touched with the signal
//! blocked, through [`CriticalSection`].

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}
