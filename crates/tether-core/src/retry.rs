//! Reconnect backoff schedule.
//!
//! Used by the push channel: delays start at the configured initial value,
//! double per consecutive failure up to the cap, and reset on a successful
//! connect.

use serde::{Deserialize, Serialize};

/// Default initial reconnect delay in milliseconds.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;
/// Default reconnect delay cap in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;

/// Backoff parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt in ms.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_ms: u64,
    /// Upper bound for the doubled delay in ms.
    #[serde(default = "default_max_backoff_ms")]
    pub max_ms: u64,
}

fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}
fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

/// Stateful doubling schedule.
#[derive(Clone, Copy, Debug)]
pub struct BackoffSchedule {
    config: BackoffConfig,
    attempt: u32,
}

impl BackoffSchedule {
    /// Create a schedule at the initial delay.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// The delay to wait before the next attempt, advancing the schedule.
    pub fn next_delay_ms(&mut self) -> u64 {
        let delay = backoff_delay_ms(self.attempt, self.config.initial_ms, self.config.max_ms);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Reset to the initial delay after a successful connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of consecutive failures recorded so far.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Doubling backoff: `min(max, initial * 2^attempt)`.
#[must_use]
pub fn backoff_delay_ms(attempt: u32, initial_ms: u64, max_ms: u64) -> u64 {
    initial_ms
        .saturating_mul(1u64 << attempt.min(31))
        .min(max_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_cap() {
        assert_eq!(backoff_delay_ms(0, 1000, 60_000), 1000);
        assert_eq!(backoff_delay_ms(1, 1000, 60_000), 2000);
        assert_eq!(backoff_delay_ms(2, 1000, 60_000), 4000);
        assert_eq!(backoff_delay_ms(6, 1000, 60_000), 60_000);
        assert_eq!(backoff_delay_ms(31, 1000, 60_000), 60_000);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        assert_eq!(backoff_delay_ms(u32::MAX, 1000, 60_000), 60_000);
    }

    #[test]
    fn schedule_advances_and_resets() {
        let mut schedule = BackoffSchedule::new(BackoffConfig {
            initial_ms: 100,
            max_ms: 400,
        });
        assert_eq!(schedule.next_delay_ms(), 100);
        assert_eq!(schedule.next_delay_ms(), 200);
        assert_eq!(schedule.next_delay_ms(), 400);
        assert_eq!(schedule.next_delay_ms(), 400);
        assert_eq!(schedule.attempt(), 4);

        schedule.reset();
        assert_eq!(schedule.attempt(), 0);
        assert_eq!(schedule.next_delay_ms(), 100);
    }

    #[test]
    fn config_defaults() {
        let config = BackoffConfig::default();
        assert_eq!(config.initial_ms, 1000);
        assert_eq!(config.max_ms, 60_000);
    }

    #[test]
    fn config_serde_defaults() {
        let config: BackoffConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.initial_ms, DEFAULT_INITIAL_BACKOFF_MS);
        assert_eq!(config.max_ms, DEFAULT_MAX_BACKOFF_MS);
    }
}
