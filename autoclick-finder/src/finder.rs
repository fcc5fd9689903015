//! SmartTargetFinder (C9): resolves a window via ordered strategies, stays
//! current via an out-of-context event hook plus adaptive polling, and
//! attempts bounded auto-recovery when the target disappears.

use std::sync::mpsc::Receiver;
use std::time::Instant;

use autoclick_capture::win32::{self, EnumeratedWindow};
use autoclick_ipc::{StrategyRecord, StrategyStats, WindowEvent};

use crate::error::Result;
use crate::hook::EventHook;
use crate::polling::{AdaptivePoller, PollingConfig, RecoveryConfig, RecoveryState};
use crate::strategies::{FinderQuery, StrategyName, resolve};

const MIN_MATERIAL_AREA: i64 = 160 * 120;

fn window_area(w: &EnumeratedWindow) -> i64 {
    win::window_rect(w.hwnd)
        .map(|(width, height)| width as i64 * height as i64)
        .unwrap_or(0)
}

#[cfg(target_os = "windows")]
mod win {
    use windows::Win32::Foundation::{HWND, RECT};
    use windows::Win32::UI::WindowsAndMessaging::GetWindowRect;

    pub fn window_rect(hwnd: isize) -> Option<(i32, i32)> {
        let mut rect = RECT::default();
        let ok = unsafe { GetWindowRect(HWND(hwnd as *mut _), &mut rect) };
        if ok.is_err() {
            return None;
        }
        Some((rect.right - rect.left, rect.bottom - rect.top))
    }
}

#[cfg(not(target_os = "windows"))]
mod win {
    pub fn window_rect(_hwnd: isize) -> Option<(i32, i32)> {
        None
    }
}

pub struct SmartTargetFinder {
    query: FinderQuery,
    stats: StrategyStats,
    poller: AdaptivePoller,
    recovery: RecoveryState,
    current_hwnd: Option<isize>,
    hook: Option<EventHook>,
    hook_rx: Option<Receiver<WindowEvent>>,
}

impl SmartTargetFinder {
    pub fn new(query: FinderQuery, polling: PollingConfig, recovery: RecoveryConfig) -> Self {
        Self {
            query,
            stats: StrategyStats::default(),
            poller: AdaptivePoller::new(polling),
            recovery: RecoveryState::new(recovery),
            current_hwnd: None,
            hook: None,
            hook_rx: None,
        }
    }

    pub fn list_windows(&self) -> Result<Vec<EnumeratedWindow>> {
        Ok(win32::enumerate_windows()?)
    }

    /// Starts the background event-hook thread. Safe to call more than
    /// once; a second call replaces the previous hook.
    pub fn start_event_hook(&mut self) -> Result<()> {
        self.stop_event_hook();
        let (hook, rx) = EventHook::install()?;
        self.hook = Some(hook);
        self.hook_rx = Some(rx);
        Ok(())
    }

    pub fn stop_event_hook(&mut self) {
        if let Some(mut hook) = self.hook.take() {
            hook.stop();
        }
        self.hook_rx = None;
    }

    pub fn current_hwnd(&self) -> Option<isize> {
        self.current_hwnd
    }

    pub fn stats(&self) -> &StrategyStats {
        &self.stats
    }

    fn record_strategy_outcome(&mut self, strategy: StrategyName, success: bool, now_ms: i64) {
        let entry = self
            .stats
            .entries
            .entry(strategy.as_str().to_string())
            .or_insert_with(StrategyRecord::default);
        if success {
            entry.success_count += 1;
        } else {
            entry.failure_count += 1;
        }
        entry.last_used_ms = now_ms;
    }

    /// Runs a full resolution pass right now, independent of the poller's
    /// schedule. Updates strategy stats, the adaptive interval, and
    /// recovery bookkeeping.
    pub fn search_once(&mut self, now: Instant, now_ms: i64) -> Result<Option<isize>> {
        let windows = self.list_windows()?;
        match resolve(&self.query, &windows) {
            Some((w, strategy)) => {
                self.record_strategy_outcome(strategy, true, now_ms);
                self.current_hwnd = Some(w.hwnd);
                self.poller.record_success(now);
                self.recovery.on_target_found();
                Ok(Some(w.hwnd))
            }
            None => {
                self.poller.record_failure(now);
                self.recovery.on_target_lost(now);
                self.current_hwnd = None;
                Ok(None)
            }
        }
    }

    /// Whether a scheduled poll is due right now.
    pub fn poll_due(&self, now: Instant) -> bool {
        self.poller.due(now)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        self.poller.current_interval()
    }

    pub fn recovery_should_retry(&self, now: Instant) -> bool {
        self.recovery.should_retry(now)
    }

    pub fn recovery_exhausted(&self) -> bool {
        self.recovery.attempts_exhausted()
    }

    /// Drains pending events from the hook and evaluates each as a
    /// candidate switch: a foreground switch always wins, other events
    /// (show/create/name-change) only win if the new window matches the
    /// query and has a materially larger area than the current target (or
    /// no target is held).
    pub fn drain_hook_events(&mut self) -> Vec<isize> {
        let Some(rx) = self.hook_rx.as_ref() else {
            return Vec::new();
        };
        let mut switches = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Some(hwnd) = self.evaluate_candidate_event(event) {
                switches.push(hwnd);
            }
        }
        switches
    }

    fn evaluate_candidate_event(&mut self, event: WindowEvent) -> Option<isize> {
        let hwnd = match event {
            WindowEvent::Foreground { hwnd } => hwnd as isize,
            WindowEvent::CreateOrShow { hwnd } => hwnd as isize,
            WindowEvent::NameChange { hwnd } => hwnd as isize,
        };

        let windows = self.list_windows().ok()?;
        let candidate = windows.iter().find(|w| w.hwnd == hwnd && w.visible)?;
        if resolve(&self.query, std::slice::from_ref(candidate)).is_none() {
            return None;
        }

        let is_foreground_event = matches!(event, WindowEvent::Foreground { .. });
        if is_foreground_event {
            self.current_hwnd = Some(hwnd);
            return Some(hwnd);
        }

        let current_area = self
            .current_hwnd
            .and_then(|h| windows.iter().find(|w| w.hwnd == h))
            .map(window_area)
            .unwrap_or(0);
        let candidate_area = window_area(candidate);
        if self.current_hwnd.is_none() || candidate_area >= current_area.max(MIN_MATERIAL_AREA) {
            self.current_hwnd = Some(hwnd);
            Some(hwnd)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclick_ipc::FinderStrategies;

    fn query() -> FinderQuery {
        FinderQuery {
            process_basename: Some("notepad.exe".into()),
            enabled: FinderStrategies::default(),
            ..Default::default()
        }
    }

    #[test]
    fn new_finder_has_no_current_target() {
        let finder = SmartTargetFinder::new(query(), PollingConfig::default(), RecoveryConfig::default());
        assert!(finder.current_hwnd().is_none());
        assert!(finder.poll_due(Instant::now()));
    }

    #[test]
    fn strategy_outcomes_accumulate_in_stats() {
        let mut finder = SmartTargetFinder::new(query(), PollingConfig::default(), RecoveryConfig::default());
        finder.record_strategy_outcome(StrategyName::ProcessBasename, true, 1000);
        finder.record_strategy_outcome(StrategyName::ProcessBasename, false, 2000);
        let entry = finder.stats().entries.get("process_basename").unwrap();
        assert_eq!(entry.success_count, 1);
        assert_eq!(entry.failure_count, 1);
        assert_eq!(entry.last_used_ms, 2000);
    }
}
