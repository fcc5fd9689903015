//! ScannerWorker (C7): the per-tick capture -> match -> click loop. Runs
//! either embedded (tests, or a future in-process mode) or driven by the
//! `autoclick-scanner-worker` subprocess binary's stdin command loop.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use autoclick_capture::{CaptureManager, CaptureManagerConfig, CaptureTarget};
use autoclick_click::{ClickEmitter, ClientClickOptions, ScreenClickOptions};
use autoclick_config::TemplateSourceLoader;
use autoclick_ipc::{MatchHit, ScannerConfig, ScannerStatus};
use autoclick_match::{Matcher, TemplateCache};

use crate::error::Result;

const SHARED_CACHE_CONSUMER: &str = "scanner_detection";
const MAX_EMPTY_STREAK_FOR_BACKOFF: u32 = 4;
const MIN_TICK_DELAY_MS: u64 = 5;
const MAX_TICK_DELAY_MS: u64 = 200;

/// Outcome of a single `tick()` call: a status update to forward to the
/// controller, and a hit to forward if a click was (or would have been)
/// performed.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub status: Option<ScannerStatus>,
    pub hit: Option<MatchHit>,
    pub clicked: bool,
}

pub struct ScannerWorker {
    config: ScannerConfig,
    manager: CaptureManager,
    templates: TemplateCache,
    matcher: Matcher,
    clicker: ClickEmitter,
    scan_count: u64,
    empty_streak: u32,
    consecutive_clicks: u32,
    next_click_allowed_at: Option<Instant>,
    last_tick_had_frame: bool,
}

impl ScannerWorker {
    pub fn new(config: ScannerConfig, app_root: PathBuf) -> Result<Self> {
        config.validate()?;
        let capture_cfg = CaptureManagerConfig {
            fps_max: config.fps_max,
            include_cursor: config.include_cursor,
            border_required: config.border_required,
            restore_minimized: config.restore_minimized,
        };
        let cache = std::sync::Arc::new(autoclick_capture::SharedFrameCache::new(Duration::from_millis(500)));
        let manager = CaptureManager::new(cache, capture_cfg);
        let loader = TemplateSourceLoader::new(app_root);
        let templates = TemplateCache::new(loader, 32);

        Ok(Self {
            config,
            manager,
            templates,
            matcher: Matcher::new(),
            clicker: ClickEmitter::new(),
            scan_count: 0,
            empty_streak: 0,
            consecutive_clicks: 0,
            next_click_allowed_at: None,
            last_tick_had_frame: false,
        })
    }

    /// Startup sequence: open the capture target (async init, matching the
    /// §4.2/§4.3 contract that `open()` returns once the native capture
    /// call succeeds rather than blocking on the first frame), warm the
    /// template cache, and produce the readiness-handshake status.
    pub fn start(&mut self) -> Result<ScannerStatus> {
        self.manager
            .open(&self.config.target_spec, true, Duration::from_millis(1500))?;
        if let Err(e) = self.templates.warm(&self.config.template_refs, self.config.grayscale) {
            log::warn!("template warm-up failed, will retry lazily on first tick: {e}");
        }
        Ok(ScannerStatus {
            running: true,
            phase_text: "running".into(),
            backend_label: "windows-capture".into(),
            detail: "capture session opened".into(),
            scan_count: 0,
            error_message: None,
            timestamp_ms: now_ms(),
        })
    }

    pub fn update_config(&mut self, config: ScannerConfig) -> Result<()> {
        config.validate()?;
        let capture_cfg = CaptureManagerConfig {
            fps_max: config.fps_max,
            include_cursor: config.include_cursor,
            border_required: config.border_required,
            restore_minimized: config.restore_minimized,
        };
        self.manager.reconfigure(capture_cfg)?;
        self.config = config;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.manager.close(Duration::from_millis(1200));
    }

    /// The delay to wait before the next tick: the configured interval
    /// while frames are flowing, or a backoff scaled by the consecutive
    /// empty-frame streak (clamped to a short [5ms, 200ms] band so the
    /// worker recovers quickly once frames resume) while they are not.
    pub fn next_tick_delay(&self) -> Duration {
        if self.last_tick_had_frame {
            return Duration::from_millis(self.config.effective_interval_ms());
        }
        let factor = 1.0 + 0.5 * self.empty_streak.min(MAX_EMPTY_STREAK_FOR_BACKOFF) as f64;
        let raw = (self.config.effective_interval_ms() as f64 * factor) as u64;
        Duration::from_millis(raw.clamp(MIN_TICK_DELAY_MS, MAX_TICK_DELAY_MS))
    }

    /// One iteration of capture -> match -> click.
    pub fn tick(&mut self) -> TickOutcome {
        let now = Instant::now();
        self.scan_count += 1;

        let frame = self
            .manager
            .get_shared_frame(SHARED_CACHE_CONSUMER)
            .map(|view| view.frame)
            .or_else(|| self.manager.capture_frame());
        self.manager.release_shared_frame(SHARED_CACHE_CONSUMER);

        let Some(frame) = frame else {
            self.empty_streak += 1;
            self.last_tick_had_frame = false;
            return TickOutcome {
                status: Some(self.status_snapshot("no frame available", None)),
                hit: None,
                clicked: false,
            };
        };
        self.last_tick_had_frame = true;
        self.empty_streak = 0;

        let mut decoded_templates = Vec::with_capacity(self.config.template_refs.len());
        for source_ref in &self.config.template_refs {
            match self.templates.get(source_ref, self.config.grayscale) {
                Ok(template) => decoded_templates.push(template),
                Err(e) => log::warn!("failed to load template {source_ref}: {e}"),
            }
        }
        // Pass the whole set to one `find_best` call so its cross-template
        // early/mid-exit heuristics can actually take effect.
        let mut hit = self.matcher.find_best_in_frame(
            &frame,
            &decoded_templates,
            self.config.roi,
            self.config.threshold,
            self.config.grayscale,
        );
        if let Some(found) = hit.as_mut() {
            found.capture_mode = match self.manager.current_target() {
                Some(CaptureTarget::Monitor(_)) | None => autoclick_ipc::CaptureMode::Monitor,
                Some(CaptureTarget::Window(_)) => autoclick_ipc::CaptureMode::Window,
            };
        }

        let mut clicked = false;
        if let Some(ref found) = hit
            && self.click_is_allowed(now)
        {
            if let Err(e) = self.perform_click(found, frame.width(), frame.height()) {
                log::warn!("click failed: {e}");
            } else {
                clicked = true;
                self.register_click(now);
            }
        }

        TickOutcome {
            status: Some(self.status_snapshot("scanning", hit.as_ref())),
            hit,
            clicked,
        }
    }

    fn click_is_allowed(&self, now: Instant) -> bool {
        match self.next_click_allowed_at {
            Some(at) => now >= at,
            None => true,
        }
    }

    /// Cooldown grows with consecutive clicks, per the load-shedding rule:
    /// `next_click_allowed = now + base_delay * (1 + 0.1 * consecutive_clicks)`.
    fn register_click(&mut self, now: Instant) {
        self.consecutive_clicks += 1;
        let factor = 1.0 + 0.1 * self.consecutive_clicks as f64;
        let delay_ms = (self.config.click_delay_ms as f64 * factor) as u64;
        self.next_click_allowed_at = Some(now + Duration::from_millis(delay_ms));
    }

    /// Clicks use the manager's actually-resolved target, not the raw
    /// `target_spec` the worker was configured with: a `Title`/
    /// `ProcessName` spec only becomes a concrete handle once a session is
    /// open against it.
    fn perform_click(&mut self, hit: &MatchHit, content_w: u32, content_h: u32) -> Result<()> {
        let mx = hit.x + hit.template_w as i32 / 2 + self.config.click_offset.dx;
        let my = hit.y + hit.template_h as i32 / 2 + self.config.click_offset.dy;

        match self.manager.current_target() {
            Some(CaptureTarget::Monitor(_)) | None => {
                self.clicker.click_screen(
                    mx,
                    my,
                    ScreenClickOptions {
                        enhanced_window_finding: self.config.enhanced_window_finding,
                        verify_window: self.config.verify_window_before_click,
                        send_mousemove: self.config.send_mousemove_before_click,
                    },
                )?;
            }
            Some(CaptureTarget::Window(hwnd)) => {
                let (cx, cy) = scale_to_client(mx, my, content_w, content_h, hwnd);
                self.clicker.click_client(
                    hwnd,
                    cx,
                    cy,
                    ClientClickOptions {
                        find_deep_child: self.config.enhanced_window_finding,
                        verify_window: self.config.verify_window_before_click,
                        send_mousemove: self.config.send_mousemove_before_click,
                    },
                )?;
            }
        }
        Ok(())
    }

    fn status_snapshot(&self, detail: &str, hit: Option<&MatchHit>) -> ScannerStatus {
        ScannerStatus {
            running: true,
            phase_text: if hit.is_some() { "match_found" } else { "scanning" }.into(),
            backend_label: "windows-capture".into(),
            detail: detail.into(),
            scan_count: self.scan_count,
            error_message: None,
            timestamp_ms: now_ms(),
        }
    }
}

/// Scales a point in capture-content pixel coordinates down to the
/// window's client-area coordinates, per the DPI-aware content-to-client
/// ratio (e.g. a 1920x1080 content buffer over a 960x540 client area
/// scales a point by 0.5 in both axes). Falls back to the unscaled point
/// if the client rect cannot be read.
fn scale_to_client(mx: i32, my: i32, content_w: u32, content_h: u32, hwnd: isize) -> (i32, i32) {
    let Some((client_w, client_h)) = autoclick_capture::win32::client_size(hwnd) else {
        return (mx, my);
    };
    if content_w == 0 || content_h == 0 {
        return (mx, my);
    }
    let sx = client_w as f64 / content_w as f64;
    let sy = client_h as f64 / content_h as f64;
    ((mx as f64 * sx).round() as i32, (my as f64 * sy).round() as i32)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_delay_uses_configured_interval_when_frames_are_flowing() {
        let delay = compute_delay_for_test(true, 100, 0);
        assert_eq!(delay, Duration::from_millis(100));
    }

    #[test]
    fn tick_delay_backs_off_and_clamps_when_frames_are_missing() {
        let delay = compute_delay_for_test(false, 100, 10);
        assert_eq!(delay, Duration::from_millis(200));
    }

    #[test]
    fn tick_delay_never_drops_below_the_floor() {
        let delay = compute_delay_for_test(false, 1, 0);
        assert_eq!(delay, Duration::from_millis(5));
    }

    fn compute_delay_for_test(had_frame: bool, interval_ms: u64, empty_streak: u32) -> Duration {
        if had_frame {
            return Duration::from_millis(interval_ms);
        }
        let factor = 1.0 + 0.5 * empty_streak.min(MAX_EMPTY_STREAK_FOR_BACKOFF) as f64;
        let raw = (interval_ms as f64 * factor) as u64;
        Duration::from_millis(raw.clamp(MIN_TICK_DELAY_MS, MAX_TICK_DELAY_MS))
    }
}
