//! Preemption timer
//!
//! Fires `SIGVTALRM` every `period` of CPU time consumed by the runtime's
//! OS thread.
//!
//! On Linux this is a POSIX timer on `CLOCK_THREAD_CPUTIME_ID` delivered
//! with `SIGEV_THREAD_ID`: only the creating thread is signalled and only
//! its own CPU time counts, so independent runtimes on other OS threads do
//! not disturb each other. Other Unix systems fall back to the process-wide
//! `ITIMER_VIRTUAL`.

use nix::errno::Errno;
use std::time::Duration;
use uthread_core::error::{SchedError, SchedResult};

fn last_errno() -> SchedError {
    SchedError::PlatformError(Errno::last() as i32)
}

/// Armed periodic timer; disarmed on drop
#[derive(Debug)]
pub struct PreemptTimer {
    inner: imp::RawTimer,
    period: Duration,
}

impl PreemptTimer {
    /// Arm a periodic timer targeting the calling OS thread
    pub fn start(period: Duration) -> SchedResult<Self> {
        if period.is_zero() {
            return Err(SchedError::InvalidConfig("preemption period must be non-zero"));
        }
        let inner = imp::RawTimer::start(period)?;
        Ok(Self { inner, period })
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(target_os = "linux")]
mod imp {
    use super::last_errno;
    use std::time::Duration;
    use uthread_core::error::SchedResult;

    fn timespec(d: Duration) -> libc::timespec {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        ts.tv_sec = d.as_secs() as libc::time_t;
        ts.tv_nsec = d.subsec_nanos() as libc::c_long;
        ts
    }

    #[derive(Debug)]
    pub struct RawTimer {
        id: libc::timer_t,
    }

    impl RawTimer {
        pub fn start(period: Duration) -> SchedResult<Self> {
            let tid = unsafe { libc::syscall(libc::SYS_gettid) } as libc::pid_t;

            let mut sev: libc::sigevent = unsafe { std::mem::zeroed() };
            sev.sigev_notify = libc::SIGEV_THREAD_ID;
            sev.sigev_signo = libc::SIGVTALRM;
            sev.sigev_notify_thread_id = tid;

            let mut id: libc::timer_t = std::ptr::null_mut();
            let ret = unsafe { libc::timer_create(libc::CLOCK_THREAD_CPUTIME_ID, &mut sev, &mut id) };
            if ret != 0 {
                return Err(last_errno());
            }
            let timer = RawTimer { id };

            let mut spec: libc::itimerspec = unsafe { std::mem::zeroed() };
            spec.it_interval = timespec(period);
            spec.it_value = timespec(period);
            let ret = unsafe { libc::timer_settime(timer.id, 0, &spec, std::ptr::null_mut()) };
            if ret != 0 {
                // timer dropped -> deleted
                return Err(last_errno());
            }
            Ok(timer)
        }
    }

    impl Drop for RawTimer {
        fn drop(&mut self) {
            unsafe {
                libc::timer_delete(self.id);
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::last_errno;
    use std::time::Duration;
    use uthread_core::error::SchedResult;

    fn set_virtual_timer(period: Duration) -> libc::c_int {
        let mut tv: libc::timeval = unsafe { std::mem::zeroed() };
        tv.tv_sec = period.as_secs() as libc::time_t;
        tv.tv_usec = period.subsec_micros() as libc::suseconds_t;
        let value = libc::itimerval {
            it_interval: tv,
            it_value: tv,
        };
        unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &value, std::ptr::null_mut()) }
    }

    #[derive(Debug)]
    pub struct RawTimer;

    impl RawTimer {
        pub fn start(period: Duration) -> SchedResult<Self> {
            if set_virtual_timer(period) != 0 {
                return Err(last_errno());
            }
            Ok(RawTimer)
        }
    }

    impl Drop for RawTimer {
        fn drop(&mut self) {
            set_virtual_timer(Duration::ZERO);
        }
    }
}
