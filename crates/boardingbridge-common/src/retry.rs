//! Per-key exponential backoff for failed reconciles.
//!
//! The controller runtime re-delivers a key after whatever `Action` the error
//! policy returns. [`RetryTracker`] remembers how many times in a row each key
//! has failed so that delay grows as `initial * multiplier^failures`, capped at
//! `max_delay`. A successful reconcile resets the key.

use std::time::Duration;

use dashmap::DashMap;

/// Backoff parameters for failed reconciles
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound on the delay
    pub max_delay: Duration,
    /// Multiplier applied per consecutive failure
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay for the given number of previous consecutive failures
    pub fn delay_for(&self, previous_failures: u32) -> Duration {
        let exponent = i32::try_from(previous_failures).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Consecutive failure counts keyed by `namespace/name`
#[derive(Debug, Default)]
pub struct RetryTracker {
    config: RetryConfig,
    failures: DashMap<String, u32>,
}

impl RetryTracker {
    /// Create a tracker with the given backoff parameters
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            failures: DashMap::new(),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying
    pub fn record_failure(&self, key: &str) -> Duration {
        let mut entry = self.failures.entry(key.to_string()).or_insert(0);
        let delay = self.config.delay_for(*entry);
        *entry = entry.saturating_add(1);
        delay
    }

    /// Forget the failure history for `key`
    pub fn reset(&self, key: &str) {
        self.failures.remove(key);
    }

    /// Consecutive failures recorded for `key`
    pub fn failures(&self, key: &str) -> u32 {
        self.failures.get(key).map(|v| *v).unwrap_or(0)
    }
}
