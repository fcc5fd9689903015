//! Startup handshake timing: the controller waits for the first
//! `ScannerStatus { running: true }` from the child within an
//! exponentially-growing timeout, retrying a bounded number of times.

use std::time::Duration;

const GROWTH_FACTOR: f64 = 1.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchdogConfig {
    pub base_timeout: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_millis(2000),
            cap: Duration::from_millis(12_000),
            max_attempts: 3,
        }
    }
}

impl WatchdogConfig {
    /// Timeout to apply for the given 1-indexed attempt: `base * 1.6^(attempt-1)`,
    /// clamped to `cap`.
    pub fn timeout_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let scale = GROWTH_FACTOR.powi((attempt - 1) as i32);
        let millis = (self.base_timeout.as_millis() as f64 * scale) as u64;
        Duration::from_millis(millis).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_uses_base_timeout() {
        let cfg = WatchdogConfig::default();
        assert_eq!(cfg.timeout_for_attempt(1), cfg.base_timeout);
    }

    #[test]
    fn later_attempts_grow_by_the_growth_factor() {
        let cfg = WatchdogConfig {
            base_timeout: Duration::from_millis(1000),
            cap: Duration::from_millis(60_000),
            max_attempts: 5,
        };
        assert_eq!(cfg.timeout_for_attempt(2), Duration::from_millis(1600));
        assert_eq!(cfg.timeout_for_attempt(3), Duration::from_millis(2560));
    }

    #[test]
    fn timeout_is_clamped_to_the_cap() {
        let cfg = WatchdogConfig {
            base_timeout: Duration::from_millis(5000),
            cap: Duration::from_millis(12_000),
            max_attempts: 10,
        };
        assert_eq!(cfg.timeout_for_attempt(10), cfg.cap);
    }
}
