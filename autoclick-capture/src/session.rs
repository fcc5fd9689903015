//! CaptureSession (C2): owns one native graphics-capture surface and
//! publishes frames into a [`SharedFrameCache`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use autoclick_ipc::ContentSize;

use crate::cache::SharedFrameCache;
use crate::error::{CaptureError, Result};
use crate::win32;

/// What a session captures from: a specific top-level window, or a monitor
/// by its enumerated index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTarget {
    Window(isize),
    Monitor(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSessionConfig {
    pub fps_max: u32,
    pub include_cursor: bool,
    pub border_required: bool,
    pub restore_minimized: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthSnapshot {
    pub consecutive_failures: u32,
    pub seconds_since_last_frame: Option<f64>,
    pub content_size: Option<ContentSize>,
}

impl HealthSnapshot {
    /// Three consecutive failures (no new frame for >10s each) is the
    /// unhealthy threshold; CaptureSession only reports this, the decision
    /// to restart belongs to CaptureManager.
    pub fn is_unhealthy(&self) -> bool {
        self.consecutive_failures >= 3
    }
}

struct SharedState {
    cache: Arc<SharedFrameCache>,
    next_frame_id: AtomicU64,
    last_frame_at: Mutex<Option<Instant>>,
    last_frame_monotonic: Mutex<Option<Instant>>,
    content_size: Mutex<Option<ContentSize>>,
    consecutive_failures: AtomicU32,
    stop_flag: Arc<AtomicBool>,
    fps_max: AtomicU64,
    frame_waiters: (Mutex<u64>, Condvar),
}

impl SharedState {
    fn min_frame_interval(&self) -> Duration {
        let fps = self.fps_max.load(Ordering::Relaxed).max(1);
        Duration::from_secs_f64(1.0 / fps as f64)
    }

    /// Implements the per-callback frame production algorithm: size-change
    /// detection, stride-safe BGR packing, fps throttle, then publish.
    fn handle_raw_bgra(&self, bgra: &[u8], width: u32, height: u32, row_pitch: u32) {
        let new_size = ContentSize::new(width, height);
        {
            let mut last = self.content_size.lock();
            if *last != Some(new_size) {
                log::debug!("capture content size changed to {}x{}", width, height);
                *last = Some(new_size);
            }
        }

        let mut last_time = self.last_frame_monotonic.lock();
        let now = Instant::now();
        if let Some(prev) = *last_time
            && now.duration_since(prev) < self.min_frame_interval()
        {
            return; // throttled: drop this frame
        }
        *last_time = Some(now);
        drop(last_time);

        let bgr = if bgra.len() as u32 == width * height * 4 && row_pitch == width * 4 {
            bgra.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect()
        } else {
            crate::frame::pack_bgra_row_strided_to_bgr(bgra, width, height, row_pitch)
        };

        let frame_id = self.next_frame_id.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = crate::frame::Frame::new(frame_id, new_size, bgr);
        self.cache.cache(frame);
        *self.last_frame_at.lock() = Some(Instant::now());
        self.consecutive_failures.store(0, Ordering::Relaxed);

        let (lock, cvar) = &self.frame_waiters;
        *lock.lock() = frame_id;
        cvar.notify_all();
    }

    fn health(&self) -> HealthSnapshot {
        let seconds_since = self
            .last_frame_at
            .lock()
            .map(|t| t.elapsed().as_secs_f64());
        if let Some(secs) = seconds_since
            && secs > 10.0
        {
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        }
        HealthSnapshot {
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            seconds_since_last_frame: seconds_since,
            content_size: *self.content_size.lock(),
        }
    }
}

/// Owns one native capture surface and one background capture thread (the
/// OS dispatches the native callback on its own thread; this struct never
/// spawns a second one).
pub struct CaptureSession {
    target: CaptureTarget,
    state: Arc<SharedState>,
    restored_from_iconic: bool,
    config: CaptureSessionConfig,
    #[cfg(target_os = "windows")]
    native: Option<win::NativeSession>,
}

impl CaptureSession {
    pub fn start(
        target: CaptureTarget,
        config: CaptureSessionConfig,
        cache: Arc<SharedFrameCache>,
    ) -> Result<Self> {
        let mut restored_from_iconic = false;
        if let CaptureTarget::Window(hwnd) = target {
            if !win32::is_window(hwnd) {
                return Err(CaptureError::InvalidHandle(hwnd as u64));
            }
            if config.restore_minimized {
                restored_from_iconic = win32::restore_without_activate_if_iconic(hwnd);
            }
        }

        let state = Arc::new(SharedState {
            cache,
            next_frame_id: AtomicU64::new(0),
            last_frame_at: Mutex::new(None),
            last_frame_monotonic: Mutex::new(None),
            content_size: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
            stop_flag: Arc::new(AtomicBool::new(false)),
            fps_max: AtomicU64::new(config.fps_max as u64),
            frame_waiters: (Mutex::new(0), Condvar::new()),
        });

        #[cfg(target_os = "windows")]
        let native = Some(win::start_native(target, &config, state.clone())?);

        #[cfg(not(target_os = "windows"))]
        {
            let _ = &state;
            return Err(CaptureError::CaptureStart(
                "graphics capture requires Windows".into(),
            ));
        }

        #[cfg(target_os = "windows")]
        Ok(Self {
            target,
            state,
            restored_from_iconic,
            config,
            native,
        })
    }

    /// Returns the most recently published frame, if any, without blocking.
    /// Reads straight through the shared cache under a transient consumer
    /// id rather than holding a registration open.
    pub fn grab(&self) -> Option<crate::frame::Frame> {
        const DIRECT_GRAB_CONSUMER: &str = "capture_session_direct";
        let view = self.state.cache.get(DIRECT_GRAB_CONSUMER, None)?;
        self.state.cache.release(DIRECT_GRAB_CONSUMER);
        Some(view.frame)
    }

    /// Blocks (the calling thread, not an async task) until a new frame
    /// arrives or `timeout` elapses.
    pub fn wait_for_frame(&self, timeout: Duration) -> Option<crate::frame::Frame> {
        let (lock, cvar) = &self.state.frame_waiters;
        let mut guard = lock.lock();
        let start_id = *guard;
        let deadline = Instant::now() + timeout;
        while *guard == start_id {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let result = cvar.wait_for(&mut guard, remaining);
            if result.timed_out() && *guard == start_id {
                return None;
            }
        }
        drop(guard);
        self.grab()
    }

    pub fn health(&self) -> HealthSnapshot {
        self.state.health()
    }

    pub fn target(&self) -> CaptureTarget {
        self.target
    }

    /// Direct stop path is authoritative (the capture-control handle, only
    /// available after the first frame, is used opportunistically as a
    /// faster-cancel optimization when present — see the design notes on
    /// the source's racy dual stop paths).
    pub fn stop(mut self, join_timeout: Duration) -> Result<()> {
        self.state.stop_flag.store(true, Ordering::SeqCst);

        #[cfg(target_os = "windows")]
        if let Some(native) = self.native.take() {
            native.stop(join_timeout)?;
        }

        if let CaptureTarget::Window(hwnd) = self.target
            && self.restored_from_iconic
            && self.config.restore_minimized
        {
            win32::minimize(hwnd);
        }

        self.state.cache.force_cleanup();
        Ok(())
    }
}

#[cfg(target_os = "windows")]
mod win {
    use super::{CaptureSessionConfig, CaptureTarget, SharedState};
    use crate::error::{CaptureError, Result};
    use std::sync::Arc;
    use std::time::Duration;
    use windows_capture::capture::{Context, GraphicsCaptureApiHandler};
    use windows_capture::frame::Frame as WcFrame;
    use windows_capture::graphics_capture_api::InternalCaptureControl;
    use windows_capture::monitor::Monitor;
    use windows_capture::settings::{
        ColorFormat, CursorCaptureSettings, DirtyRegionSettings, DrawBorderSettings,
        MinimumUpdateIntervalSettings, SecondaryWindowSettings, Settings,
    };
    use windows_capture::window::Window;

    struct Handler {
        state: Arc<SharedState>,
    }

    impl GraphicsCaptureApiHandler for Handler {
        type Flags = Arc<SharedState>;
        type Error = Box<dyn std::error::Error + Send + Sync>;

        fn new(ctx: Context<Self::Flags>) -> std::result::Result<Self, Self::Error> {
            Ok(Self { state: ctx.flags })
        }

        fn on_frame_arrived(
            &mut self,
            frame: &mut WcFrame,
            capture_control: InternalCaptureControl,
        ) -> std::result::Result<(), Self::Error> {
            if self
                .state
                .stop_flag
                .load(std::sync::atomic::Ordering::SeqCst)
            {
                capture_control.stop();
                return Ok(());
            }

            let width = frame.width();
            let height = frame.height();
            let result: std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> =
                (|| {
                    let mut buffer = frame.buffer()?;
                    match buffer.as_raw_nopadding_buffer() {
                        Ok(packed) => {
                            self.state.handle_raw_bgra(packed, width, height, width * 4);
                        }
                        Err(_) => {
                            let raw = buffer.as_raw_buffer();
                            let row_pitch = if height > 0 {
                                (raw.len() as u32) / height
                            } else {
                                width * 4
                            };
                            self.state.handle_raw_bgra(raw, width, height, row_pitch);
                        }
                    }
                    Ok(())
                })();

            if let Err(e) = result {
                log::warn!("capture callback failed to process a frame: {e}");
                // Per the CaptureFrame error policy: log and continue, do
                // not tear the session down over a single bad frame.
            }
            Ok(())
        }

        fn on_closed(&mut self) -> std::result::Result<(), Self::Error> {
            Ok(())
        }
    }

    fn cursor_settings(cfg: &CaptureSessionConfig) -> CursorCaptureSettings {
        if cfg.include_cursor {
            CursorCaptureSettings::WithCursor
        } else {
            CursorCaptureSettings::WithoutCursor
        }
    }

    fn border_settings(cfg: &CaptureSessionConfig) -> DrawBorderSettings {
        if cfg.border_required {
            DrawBorderSettings::WithBorder
        } else {
            DrawBorderSettings::WithoutBorder
        }
    }

    pub struct NativeSession {
        control: windows_capture::capture::CaptureControl<Handler, Arc<SharedState>>,
    }

    impl NativeSession {
        pub fn stop(self, _join_timeout: Duration) -> Result<()> {
            self.control
                .stop()
                .map_err(|e| CaptureError::CaptureFrame(format!("native stop failed: {e}")))
        }
    }

    pub fn start_native(
        target: CaptureTarget,
        cfg: &CaptureSessionConfig,
        state: Arc<SharedState>,
    ) -> Result<NativeSession> {
        let cursor = cursor_settings(cfg);
        let border = border_settings(cfg);

        let control = match target {
            CaptureTarget::Window(hwnd) => {
                let window = Window::from_raw_hwnd(hwnd as *mut _);
                let settings = Settings::new(
                    window,
                    cursor,
                    border,
                    SecondaryWindowSettings::Default,
                    MinimumUpdateIntervalSettings::Default,
                    DirtyRegionSettings::Default,
                    ColorFormat::Bgra8,
                    state,
                );
                Handler::start_free_threaded(settings)
                    .map_err(|e| CaptureError::CaptureStart(e.to_string()))?
            }
            CaptureTarget::Monitor(index) => {
                let monitor = Monitor::from_index(index as usize)
                    .map_err(|e| CaptureError::CaptureStart(e.to_string()))?;
                let settings = Settings::new(
                    monitor,
                    cursor,
                    border,
                    SecondaryWindowSettings::Default,
                    MinimumUpdateIntervalSettings::Default,
                    DirtyRegionSettings::Default,
                    ColorFormat::Bgra8,
                    state,
                );
                Handler::start_free_threaded(settings)
                    .map_err(|e| CaptureError::CaptureStart(e.to_string()))?
            }
        };

        Ok(NativeSession { control })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_snapshot_unhealthy_threshold_is_three_failures() {
        let snap = HealthSnapshot {
            consecutive_failures: 3,
            seconds_since_last_frame: Some(31.0),
            content_size: None,
        };
        assert!(snap.is_unhealthy());
        let ok = HealthSnapshot {
            consecutive_failures: 2,
            ..snap
        };
        assert!(!ok.is_unhealthy());
    }
}
