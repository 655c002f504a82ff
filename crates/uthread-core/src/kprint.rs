//! Leveled stderr logging for the runtime
//!
//! Every line is tagged with the green thread that produced it, which is the
//! only way to tell interleaved threads apart: they all share one OS thread.
//!
//! # Environment Variables
//!
//! - `UTH_LOG_LEVEL=<level>` - `off`, `error`, `warn`, `info`, `debug`, `trace`
//!   (or 0-5). Default `info`.
//! - `UTH_FLUSH_EPRINT=1` - flush stderr after every line
//!
//! # Usage
//!
//! ```ignore
//! use uthread_core::{kinfo, kdebug};
//!
//! kinfo!("runtime up, preemption every {:?}", period);
//! kdebug!("spawned {}", id);
//! ```
//!
//! Output from a green thread that can be preempted mid-write may interleave
//! with another thread's output; the runtime only logs from inside critical
//! sections or from the main context.

use std::cell::Cell;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log levels, most severe first
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(LogLevel::Off),
            "error" | "1" => Ok(LogLevel::Error),
            "warn" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(()),
        }
    }
}

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// Green thread currently running on this OS thread (u32::MAX = none)
    static GREEN_ID: Cell<u32> = const { Cell::new(u32::MAX) };
}

/// Read `UTH_LOG_LEVEL` / `UTH_FLUSH_EPRINT` once.
///
/// Runs lazily on the first log call; call it explicitly for deterministic
/// startup.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Some(level) = crate::env::env_get_opt::<LogLevel>("UTH_LOG_LEVEL") {
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
    FLUSH_ENABLED.store(
        crate::env::env_flag("UTH_FLUSH_EPRINT", false),
        Ordering::Relaxed,
    );
}

#[inline]
pub fn log_level() -> LogLevel {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level programmatically (overrides the environment)
pub fn set_log_level(level: LogLevel) {
    INITIALIZED.store(true, Ordering::SeqCst);
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn set_flush_enabled(enabled: bool) {
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

/// Record which green thread is running (called by the scheduler on switch)
#[inline]
pub fn set_green_id(id: u32) {
    GREEN_ID.with(|c| c.set(id));
}

#[inline]
pub fn clear_green_id() {
    GREEN_ID.with(|c| c.set(u32::MAX));
}

#[inline]
pub fn green_id() -> Option<u32> {
    let id = GREEN_ID.with(|c| c.get());
    (id != u32::MAX).then_some(id)
}

/// `[g3] ` style tag for the current line
fn thread_tag() -> String {
    match green_id() {
        Some(0) => "[main] ".to_string(),
        Some(id) => format!("[g{}] ", id),
        None => String::new(),
    }
}

fn write_line(handle: &mut impl Write, head: &str, args: std::fmt::Arguments<'_>) {
    let _ = handle.write_all(head.as_bytes());
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if FLUSH_ENABLED.load(Ordering::Relaxed) {
        let _ = handle.flush();
    }
}

#[doc(hidden)]
pub fn _kprint_impl(args: std::fmt::Arguments<'_>) {
    let mut handle = std::io::stderr().lock();
    let _ = handle.write_fmt(args);
    if FLUSH_ENABLED.load(Ordering::Relaxed) {
        let _ = handle.flush();
    }
}

#[doc(hidden)]
pub fn _kprintln_impl(args: std::fmt::Arguments<'_>) {
    let mut handle = std::io::stderr().lock();
    write_line(&mut handle, "", args);
}

#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let head = format!("[{:<5}] {}", level.label(), thread_tag());
    let mut handle = std::io::stderr().lock();
    write_line(&mut handle, &head, args);
}

// ============================================================================
// Public Macros
// ============================================================================

/// Print to stderr (no newline)
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {{
        $crate::kprint::_kprint_impl(format_args!($($arg)*));
    }};
}

/// Print to stderr with newline
#[macro_export]
macro_rules! kprintln {
    () => {{
        $crate::kprint::_kprintln_impl(format_args!(""));
    }};
    ($($arg:tt)*) => {{
        $crate::kprint::_kprintln_impl(format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Error, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Warn, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Info, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Debug, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Trace, format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!(" WARN ".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("5".parse::<LogLevel>(), Ok(LogLevel::Trace));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
    }

    #[test]
    fn test_green_id_tag() {
        clear_green_id();
        assert_eq!(green_id(), None);
        assert_eq!(thread_tag(), "");

        set_green_id(0);
        assert_eq!(thread_tag(), "[main] ");

        set_green_id(4);
        assert_eq!(green_id(), Some(4));
        assert_eq!(thread_tag(), "[g4] ");
        clear_green_id();
    }

    #[test]
    fn test_write_line_format() {
        let mut buf = Vec::new();
        write_line(&mut buf, "[INFO ] [g1] ", format_args!("x={}", 3));
        assert_eq!(String::from_utf8(buf).unwrap(), "[INFO ] [g1] x=3\n");
    }

    #[test]
    fn test_macros_compile() {
        set_log_level(LogLevel::Off);
        assert!(!level_enabled(LogLevel::Error));

        kerror!("error {}", "msg");
        kwarn!("warn");
        kinfo!("info");
        kdebug!("debug");
        ktrace!("trace");
    }
}
