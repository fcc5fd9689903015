//! Adaptive polling interval and auto-recovery bookkeeping for the target
//! finder: widens the poll interval while a target stays resolved, narrows
//! it while the search is failing, and gates retries after repeated loss.

use std::time::{Duration, Instant};

const WIDEN_FACTOR: f64 = 1.2;
const NARROW_FACTOR: f64 = 0.8;

#[derive(Debug, Clone, Copy)]
pub struct PollingConfig {
    pub base_interval_ms: u64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 1000,
            min_interval_ms: 500,
            max_interval_ms: 30_000,
        }
    }
}

pub struct AdaptivePoller {
    config: PollingConfig,
    current_interval_ms: u64,
    last_poll_at: Option<Instant>,
}

impl AdaptivePoller {
    pub fn new(config: PollingConfig) -> Self {
        Self {
            current_interval_ms: config.base_interval_ms,
            config,
            last_poll_at: None,
        }
    }

    pub fn current_interval(&self) -> Duration {
        Duration::from_millis(self.current_interval_ms)
    }

    /// Whether at least `current_interval()` has elapsed since the last
    /// recorded poll (or this is the first poll).
    pub fn due(&self, now: Instant) -> bool {
        match self.last_poll_at {
            None => true,
            Some(last) => now.duration_since(last) >= self.current_interval(),
        }
    }

    /// A target was resolved: widen toward `max_interval_ms`.
    pub fn record_success(&mut self, now: Instant) {
        self.last_poll_at = Some(now);
        let widened = (self.current_interval_ms as f64 * WIDEN_FACTOR) as u64;
        self.current_interval_ms = widened.min(self.config.max_interval_ms);
    }

    /// The search came up empty: narrow toward `min_interval_ms`.
    pub fn record_failure(&mut self, now: Instant) {
        self.last_poll_at = Some(now);
        let narrowed = (self.current_interval_ms as f64 * NARROW_FACTOR) as u64;
        self.current_interval_ms = narrowed.max(self.config.min_interval_ms);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Tracks consecutive target-loss events and whether a recovery attempt is
/// currently allowed.
pub struct RecoveryState {
    config: RecoveryConfig,
    consecutive_failures: u32,
    lost_at: Option<Instant>,
}

impl RecoveryState {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            lost_at: None,
        }
    }

    pub fn on_target_lost(&mut self, now: Instant) {
        self.consecutive_failures += 1;
        self.lost_at.get_or_insert(now);
    }

    pub fn on_target_found(&mut self) {
        self.consecutive_failures = 0;
        self.lost_at = None;
    }

    /// Whether another recovery attempt should be made right now: recovery
    /// must be enabled, the attempt budget not exhausted, and the cooldown
    /// since the target was first lost must have elapsed.
    pub fn should_retry(&self, now: Instant) -> bool {
        if !self.config.enabled || self.consecutive_failures == 0 {
            return false;
        }
        if self.consecutive_failures > self.config.max_attempts {
            return false;
        }
        match self.lost_at {
            Some(lost_at) => now.duration_since(lost_at) >= self.config.cooldown,
            None => true,
        }
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.config.enabled && self.consecutive_failures > self.config.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poller_widens_on_success_and_narrows_on_failure() {
        let mut poller = AdaptivePoller::new(PollingConfig {
            base_interval_ms: 1000,
            min_interval_ms: 500,
            max_interval_ms: 30_000,
        });
        let now = Instant::now();
        poller.record_success(now);
        assert_eq!(poller.current_interval_ms, 1200);
        poller.record_failure(now);
        assert_eq!(poller.current_interval_ms, 960);
    }

    #[test]
    fn poller_clamps_to_configured_bounds() {
        let mut poller = AdaptivePoller::new(PollingConfig {
            base_interval_ms: 29_999,
            min_interval_ms: 500,
            max_interval_ms: 30_000,
        });
        let now = Instant::now();
        poller.record_success(now);
        assert_eq!(poller.current_interval_ms, 30_000);
    }

    #[test]
    fn recovery_requires_cooldown_elapsed_since_first_loss() {
        let mut state = RecoveryState::new(RecoveryConfig {
            enabled: true,
            max_attempts: 5,
            cooldown: Duration::from_secs(10),
        });
        let t0 = Instant::now();
        state.on_target_lost(t0);
        assert!(!state.should_retry(t0));
    }

    #[test]
    fn recovery_stops_after_max_attempts_exhausted() {
        let mut state = RecoveryState::new(RecoveryConfig {
            enabled: true,
            max_attempts: 2,
            cooldown: Duration::from_secs(0),
        });
        let now = Instant::now();
        state.on_target_lost(now);
        state.on_target_lost(now);
        state.on_target_lost(now);
        assert!(state.attempts_exhausted());
        assert!(!state.should_retry(now));
    }

    #[test]
    fn target_found_resets_failure_count() {
        let mut state = RecoveryState::new(RecoveryConfig::default());
        state.on_target_lost(Instant::now());
        state.on_target_found();
        assert!(!state.attempts_exhausted());
    }
}
