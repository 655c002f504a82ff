//! Environment variable helpers used by the config and logging layers
//!
//! ```ignore
//! use uthread_core::env::{env_get, env_flag, env_micros};
//!
//! let stack: usize = env_get("UTH_STACK_SIZE", 64 * 1024);
//! let debug = env_flag("UTH_DEBUG", false);
//! let period = env_micros("UTH_PREEMPT_US", Duration::from_micros(100));
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Parse `key` as `T`, falling back to `default` when unset or malformed
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T`; `None` when unset or malformed
#[inline]
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Boolean flag: `1`, `true`, `yes`, `on` are true, `0`, `false`, `no`,
/// `off` are false (case-insensitive); anything else keeps `default`.
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => parse_flag(&val).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Duration given in whole microseconds
pub fn env_micros(key: &str, default: Duration) -> Duration {
    env_get_opt::<u64>(key)
        .map(Duration::from_micros)
        .unwrap_or(default)
}
