//! Green thread lifecycle and queue-membership tags

use core::fmt;

/// Lifecycle of a green thread
///
/// A thread that is parked on a wait list or a join slot is still
/// `Runnable` as far as its lifecycle goes; where it is parked is tracked
/// separately by [`QueueKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Not executing, waiting for the scheduler to pick it
    Runnable = 0,

    /// The one thread currently executing on the OS thread
    Running = 1,

    /// Entry function returned; resources held until join
    Finished = 2,
}

impl ThreadState {
    #[inline]
    pub const fn is_running(&self) -> bool {
        matches!(self, ThreadState::Running)
    }

    #[inline]
    pub const fn is_finished(&self) -> bool {
        matches!(self, ThreadState::Finished)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::Runnable => write!(f, "runnable"),
            ThreadState::Running => write!(f, "running"),
            ThreadState::Finished => write!(f, "finished"),
        }
    }
}

/// Which queue a non-running thread currently sits in
///
/// Every thread record carries an `Option<QueueKind>`; enqueueing a thread
/// that already has one is a scheduler invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// The runtime's ready queue
    Ready,

    /// A mutex wait list
    MutexWait,

    /// A condition variable wait list
    CondWait,

    /// Parked on another thread's joiner slot
    Join,
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueKind::Ready => write!(f, "ready queue"),
            QueueKind::MutexWait => write!(f, "mutex wait list"),
            QueueKind::CondWait => write!(f, "condvar wait list"),
            QueueKind::Join => write!(f, "join slot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ThreadState::Running.is_running());
        assert!(!ThreadState::Runnable.is_running());
        assert!(ThreadState::Finished.is_finished());
        assert!(!ThreadState::Running.is_finished());
    }

    #[test]
    fn test_display() {
        assert_eq!(ThreadState::Finished.to_string(), "finished");
        assert_eq!(QueueKind::MutexWait.to_string(), "mutex wait list");
    }
}
