//! Event loop configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use cvloop_runtime::LoopConfig;
//!
//! // Defaults with env overrides
//! let config = LoopConfig::from_env();
//!
//! // Or customize programmatically
//! let config = LoopConfig::new()
//!     .max_tasks_per_pass(64)
//!     .keepalive_period(Duration::from_secs(3600));
//! ```

use std::time::Duration;

use cvloop_core::env::{env_get, env_get_millis};

/// Library defaults
pub mod defaults {
    /// Keepalive timer period (about 46 days)
    pub const KEEPALIVE_PERIOD_MS: u64 = 4_000_000_000;
    /// Initial timer heap capacity
    pub const TIMER_CAPACITY: usize = 64;
    /// Tasks run per pass before timers get their turn
    pub const MAX_TASKS_PER_PASS: usize = 1024;
    /// Longest single park of the loop thread
    pub const MAX_PARK_MS: u64 = 3_600_000;
    /// Shortest repeating-timer period
    pub const MIN_INTERVAL_MS: u64 = 1;
}

/// Event loop configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Period of the keepalive timer held while condvars are live
    pub keepalive_period: Duration,
    /// Initial timer heap capacity
    pub timer_capacity: usize,
    /// Upper bound on queued tasks run in one pass (at least 1)
    pub max_tasks_per_pass: usize,
    /// Upper bound on one park of the loop thread
    pub max_park: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `CVL_KEEPALIVE_MS` - Keepalive timer period in milliseconds
    /// - `CVL_TIMER_CAPACITY` - Initial timer heap capacity
    /// - `CVL_MAX_TASKS_PER_PASS` - Tasks run per pass
    /// - `CVL_MAX_PARK_MS` - Longest single park in milliseconds
    pub fn from_env() -> Self {
        let base = Self::new();
        Self {
            keepalive_period: env_get_millis("CVL_KEEPALIVE_MS", base.keepalive_period),
            timer_capacity: env_get("CVL_TIMER_CAPACITY", base.timer_capacity),
            max_tasks_per_pass: env_get("CVL_MAX_TASKS_PER_PASS", base.max_tasks_per_pass),
            max_park: env_get_millis("CVL_MAX_PARK_MS", base.max_park),
        }
        .normalized()
    }

    /// Create config with library defaults (no env override).
    pub fn new() -> Self {
        Self {
            keepalive_period: Duration::from_millis(defaults::KEEPALIVE_PERIOD_MS),
            timer_capacity: defaults::TIMER_CAPACITY,
            max_tasks_per_pass: defaults::MAX_TASKS_PER_PASS,
            max_park: Duration::from_millis(defaults::MAX_PARK_MS),
        }
    }

    pub fn keepalive_period(mut self, period: Duration) -> Self {
        self.keepalive_period = period;
        self.normalized()
    }

    pub fn timer_capacity(mut self, capacity: usize) -> Self {
        self.timer_capacity = capacity;
        self
    }

    pub fn max_tasks_per_pass(mut self, n: usize) -> Self {
        self.max_tasks_per_pass = n;
        self.normalized()
    }

    pub fn max_park(mut self, max_park: Duration) -> Self {
        self.max_park = max_park;
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        let min = Duration::from_millis(defaults::MIN_INTERVAL_MS);
        self.keepalive_period = self.keepalive_period.max(min);
        self.max_park = self.max_park.max(min);
        self.max_tasks_per_pass = self.max_tasks_per_pass.max(1);
        self
    }
}
