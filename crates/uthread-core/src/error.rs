//! Error types for the uthread runtime

use core::fmt;

/// Result type for runtime operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors reported by runtime operations
///
/// Contract violations that would corrupt scheduler queues (a thread linked
/// into two queues, an empty ready queue when a switch needs a successor)
/// are not represented here: they abort the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// No thread slots left (configured `max_threads` reached)
    NoSlotsAvailable,

    /// Handle refers to a thread that no longer exists or to another runtime
    InvalidHandle,

    /// A thread tried to join itself
    JoinSelf,

    /// The target thread already has a joiner
    JoinerPresent,

    /// The joined thread's entry function panicked
    ThreadPanicked,

    /// A runtime is already active on this OS thread
    AlreadyInitialized,

    /// Configuration rejected by validation
    InvalidConfig(&'static str),

    /// Stack allocation failed
    MemoryError(MemoryError),

    /// Signal or timer setup failed (errno)
    PlatformError(i32),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::NoSlotsAvailable => write!(f, "no green thread slots available"),
            SchedError::InvalidHandle => write!(f, "invalid or stale thread handle"),
            SchedError::JoinSelf => write!(f, "a thread cannot join itself"),
            SchedError::JoinerPresent => write!(f, "thread already has a joiner"),
            SchedError::ThreadPanicked => write!(f, "green thread panicked"),
            SchedError::AlreadyInitialized => {
                write!(f, "runtime already initialized on this thread")
            }
            SchedError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            SchedError::MemoryError(e) => write!(f, "memory error: {}", e),
            SchedError::PlatformError(code) => write!(f, "platform error: errno {}", code),
        }
    }
}

impl std::error::Error for SchedError {}

/// Stack memory errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap failed
    AllocationFailed,

    /// mprotect of the guard page failed
    ProtectionFailed,

    /// madvise failed
    AdviseFailed,

    /// Requested size overflows once rounded to pages plus guard
    InvalidSize,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::AllocationFailed => write!(f, "stack allocation failed"),
            MemoryError::ProtectionFailed => write!(f, "guard page protection failed"),
            MemoryError::AdviseFailed => write!(f, "memory advise failed"),
            MemoryError::InvalidSize => write!(f, "invalid stack size"),
        }
    }
}

impl From<MemoryError> for SchedError {
    fn from(e: MemoryError) -> Self {
        SchedError::MemoryError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(SchedError::JoinSelf.to_string(), "a thread cannot join itself");

        let e = SchedError::MemoryError(MemoryError::AllocationFailed);
        assert_eq!(e.to_string(), "memory error: stack allocation failed");

        let e = SchedError::PlatformError(22);
        assert_eq!(e.to_string(), "platform error: errno 22");
    }

    #[test]
    fn test_error_conversion() {
        let sched_err: SchedError = MemoryError::InvalidSize.into();
        assert!(matches!(sched_err, SchedError::MemoryError(MemoryError::InvalidSize)));
    }
}
