//! Adaptive interval for the controller's poll of the three receive
//! channels (status/hit/log). Distinct from, and simpler than, the
//! scanner's own empty-frame backoff: this timer paces how often the
//! controller's event loop drains IPC traffic, not how often the worker
//! scans.

use std::time::{Duration, Instant};

const STEP_DOWN_MS: u64 = 10;
const STEP_UP_MS: u64 = 40;
const STEP_UP_EVERY_EMPTY_TICKS: u32 = 8;
const STEP_DOWN_EVERY_ACTIVE_TICKS: u32 = 3;
const IDLE_4X_THRESHOLD: Duration = Duration::from_secs(6);
const IDLE_MAX_THRESHOLD: Duration = Duration::from_secs(12);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingConfig {
    pub base_interval_ms: u64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 200,
            min_interval_ms: 50,
            max_interval_ms: 1200,
        }
    }
}

pub struct AdaptivePollTimer {
    config: PollingConfig,
    current_ms: u64,
    consecutive_active: u32,
    empty_streak: u32,
    idle_since: Option<Instant>,
}

impl AdaptivePollTimer {
    pub fn new(config: PollingConfig) -> Self {
        let current_ms = config.base_interval_ms;
        Self {
            config,
            current_ms,
            consecutive_active: 0,
            empty_streak: 0,
            idle_since: None,
        }
    }

    pub fn current_interval(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Any of status/hit/log channels produced something this tick.
    pub fn record_activity(&mut self) {
        self.idle_since = None;
        self.empty_streak = 0;
        self.current_ms = self.config.base_interval_ms;
        self.consecutive_active += 1;
        if self.consecutive_active % STEP_DOWN_EVERY_ACTIVE_TICKS == 0 {
            self.current_ms = self.current_ms.saturating_sub(STEP_DOWN_MS).max(self.config.min_interval_ms);
        }
    }

    /// All three channels were empty this tick.
    pub fn record_empty(&mut self, now: Instant) {
        self.consecutive_active = 0;
        self.empty_streak += 1;
        let idle_since = *self.idle_since.get_or_insert(now);

        if self.empty_streak % STEP_UP_EVERY_EMPTY_TICKS == 0 {
            self.current_ms = (self.current_ms + STEP_UP_MS).min(self.config.max_interval_ms);
        }

        let idle_elapsed = now.saturating_duration_since(idle_since);
        if idle_elapsed >= IDLE_MAX_THRESHOLD {
            self.current_ms = self.config.max_interval_ms;
        } else if idle_elapsed >= IDLE_4X_THRESHOLD {
            self.current_ms = (self.config.base_interval_ms * 4).min(self.config.max_interval_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_resets_to_base_interval() {
        let mut timer = AdaptivePollTimer::new(PollingConfig::default());
        timer.record_empty(Instant::now());
        timer.record_activity();
        assert_eq!(timer.current_interval(), Duration::from_millis(200));
    }

    #[test]
    fn three_consecutive_active_ticks_step_down_toward_min() {
        let mut timer = AdaptivePollTimer::new(PollingConfig::default());
        timer.record_activity();
        timer.record_activity();
        timer.record_activity();
        assert_eq!(timer.current_interval(), Duration::from_millis(190));
    }

    #[test]
    fn empty_ticks_step_up_toward_max() {
        let mut timer = AdaptivePollTimer::new(PollingConfig::default());
        let now = Instant::now();
        for _ in 0..8 {
            timer.record_empty(now);
        }
        assert_eq!(timer.current_interval(), Duration::from_millis(240));
    }

    #[test]
    fn long_idle_jumps_to_the_max_interval() {
        let mut timer = AdaptivePollTimer::new(PollingConfig::default());
        let t0 = Instant::now();
        timer.record_empty(t0);
        timer.record_empty(t0 + Duration::from_secs(13));
        assert_eq!(timer.current_interval(), Duration::from_millis(1200));
    }
}
