//! Runtime configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. User's `uth_config.rs` (compile-time, selected by `UTH_CONFIG_RS`)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use uthread_runtime::config::RuntimeConfig;
//!
//! // Defaults with env overrides
//! let config = RuntimeConfig::from_env();
//!
//! // Deterministic, cooperative-only scheduling
//! let config = RuntimeConfig::new()
//!     .stack_size(128 * 1024)
//!     .preempt_period(Duration::ZERO);
//! ```

pub mod defaults;

use std::time::Duration;
use uthread_core::constants::{MAX_STACK_SIZE, MIN_STACK_SIZE};
use uthread_core::env::{env_flag, env_get, env_micros};
use uthread_core::kprintln;
use uthread_core::SchedError;

/// Runtime configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Usable stack bytes per green thread (a guard page is added below)
    pub stack_size: usize,
    /// Preemption timer period in thread CPU time; zero disables preemption
    pub preempt_period: Duration,
    /// Maximum live green threads, main included
    pub max_threads: usize,
    /// Stacks kept mapped for reuse after join
    pub stack_cache: usize,
    /// Log spawn/join/switch activity at debug level
    pub debug_logging: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `UTH_STACK_SIZE` - stack bytes per green thread
    /// - `UTH_PREEMPT_US` - preemption period in microseconds (0 = off)
    /// - `UTH_MAX_THREADS` - maximum live threads
    /// - `UTH_STACK_CACHE` - pooled stacks kept after join
    /// - `UTH_DEBUG` - enable debug logging (0/1)
    pub fn from_env() -> Self {
        let base = Self::new();
        Self {
            stack_size: env_get("UTH_STACK_SIZE", base.stack_size),
            preempt_period: env_micros("UTH_PREEMPT_US", base.preempt_period),
            max_threads: env_get("UTH_MAX_THREADS", base.max_threads),
            stack_cache: env_get("UTH_STACK_CACHE", base.stack_cache),
            debug_logging: env_flag("UTH_DEBUG", base.debug_logging),
        }
    }

    /// Compile-time defaults only (no env override).
    pub fn new() -> Self {
        Self {
            stack_size: defaults::STACK_SIZE,
            preempt_period: Duration::from_micros(defaults::PREEMPT_PERIOD_US),
            max_threads: defaults::MAX_THREADS,
            stack_cache: defaults::STACK_CACHE,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn preempt_period(mut self, period: Duration) -> Self {
        self.preempt_period = period;
        self
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn stack_cache(mut self, n: usize) -> Self {
        self.stack_cache = n;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    #[inline]
    pub fn preemption_enabled(&self) -> bool {
        !self.preempt_period.is_zero()
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        if self.stack_size > MAX_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be <= 1GB"));
        }
        if self.max_threads < 2 {
            return Err(ConfigError::InvalidValue(
                "max_threads must be >= 2 (main plus one green thread)",
            ));
        }
        Ok(())
    }

    /// Print configuration to stderr (for debugging)
    pub fn print(&self) {
        kprintln!("{}", self);
    }
}

impl std::fmt::Display for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "uthread configuration:")?;
        writeln!(f, "  stack_size:      {}", self.stack_size)?;
        writeln!(f, "  preempt_period:  {:?}", self.preempt_period)?;
        writeln!(f, "  max_threads:     {}", self.max_threads)?;
        writeln!(f, "  stack_cache:     {}", self.stack_cache)?;
        write!(f, "  debug_logging:   {}", self.debug_logging)
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SchedError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => SchedError::InvalidConfig(msg),
        }
    }
}
