//! CaptureManager (C3): resolves a [`autoclick_ipc::TargetSpec`] to a
//! window/monitor handle, owns at most one live [`CaptureSession`], and
//! exposes the shared-frame API to consumers.

use std::sync::Arc;
use std::time::Duration;

use autoclick_ipc::TargetSpec;

use crate::cache::{SharedFrameCache, SharedFrameView};
use crate::error::{CaptureError, Result};
use crate::frame::Frame;
use crate::session::{CaptureSession, CaptureSessionConfig, CaptureTarget, HealthSnapshot};
use crate::win32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureManagerConfig {
    pub fps_max: u32,
    pub include_cursor: bool,
    pub border_required: bool,
    pub restore_minimized: bool,
}

impl From<CaptureManagerConfig> for CaptureSessionConfig {
    fn from(c: CaptureManagerConfig) -> Self {
        CaptureSessionConfig {
            fps_max: c.fps_max,
            include_cursor: c.include_cursor,
            border_required: c.border_required,
            restore_minimized: c.restore_minimized,
        }
    }
}

pub struct MonitorInfo {
    pub index: u32,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

pub fn list_monitors() -> Vec<MonitorInfo> {
    win32::enumerate_monitors()
        .into_iter()
        .map(|m| MonitorInfo {
            index: m.index,
            left: m.left,
            top: m.top,
            right: m.right,
            bottom: m.bottom,
        })
        .collect()
}

/// Resolves a target spec against the live window list, applying the
/// priority order from §4.3: (a) handle used as-is, (b) title substring,
/// (c) process-name substring. Monitor targets skip window resolution
/// entirely.
pub fn resolve_target(spec: &TargetSpec) -> Result<CaptureTarget> {
    match spec {
        TargetSpec::Handle { hwnd } => {
            if win32::is_window(*hwnd as isize) {
                Ok(CaptureTarget::Window(*hwnd as isize))
            } else {
                Err(CaptureError::InvalidHandle(*hwnd))
            }
        }
        TargetSpec::Title { text, partial } => {
            let windows = win32::enumerate_windows()?;
            windows
                .into_iter()
                .find(|w| w.visible && title_matches(&w.title, text, *partial))
                .map(|w| CaptureTarget::Window(w.hwnd))
                .ok_or(CaptureError::TargetNotFound)
        }
        TargetSpec::ProcessName { text, partial } => {
            let windows = win32::enumerate_windows()?;
            windows
                .into_iter()
                .find(|w| w.visible && name_matches(&w.process_name, text, *partial))
                .map(|w| CaptureTarget::Window(w.hwnd))
                .ok_or(CaptureError::TargetNotFound)
        }
        TargetSpec::Monitor { index } => {
            let monitors = list_monitors();
            if (*index as usize) < monitors.len() {
                Ok(CaptureTarget::Monitor(*index))
            } else {
                Err(CaptureError::MonitorIndexOutOfRange(*index))
            }
        }
    }
}

fn title_matches(title: &str, text: &str, partial: bool) -> bool {
    if partial {
        title.to_lowercase().contains(&text.to_lowercase())
    } else {
        title.eq_ignore_ascii_case(text)
    }
}

fn name_matches(process_name: &str, text: &str, partial: bool) -> bool {
    if partial {
        process_name.to_lowercase().contains(&text.to_lowercase())
    } else {
        process_name.eq_ignore_ascii_case(text)
    }
}

/// Wraps a single live [`CaptureSession`] and is the only thing the
/// scanner worker talks to directly for frames.
pub struct CaptureManager {
    cache: Arc<SharedFrameCache>,
    config: CaptureManagerConfig,
    session: Option<CaptureSession>,
}

impl CaptureManager {
    pub fn new(cache: Arc<SharedFrameCache>, config: CaptureManagerConfig) -> Self {
        Self {
            cache,
            config,
            session: None,
        }
    }

    /// Resolves `spec`, starts a session against it. With `async_init`,
    /// returns as soon as the native `start()` call returns; otherwise
    /// performs a bounded `wait_for_frame` validation before returning.
    pub fn open(
        &mut self,
        spec: &TargetSpec,
        async_init: bool,
        validation_timeout: Duration,
    ) -> Result<()> {
        self.close(Duration::from_millis(1200));

        let target = resolve_target(spec)?;
        let session = CaptureSession::start(target, self.config.into(), self.cache.clone())?;
        if !async_init {
            let got = session.wait_for_frame(validation_timeout);
            if got.is_none() {
                log::warn!("capture session produced no frame within the validation timeout");
            }
        }
        self.session = Some(session);
        Ok(())
    }

    /// Restores the live session's window if it is currently minimized and
    /// `restore_minimized` is configured, then performs a direct
    /// (non-shared-cache) capture.
    pub fn capture_frame(&self) -> Option<Frame> {
        let session = self.session.as_ref()?;
        if self.config.restore_minimized
            && let CaptureTarget::Window(hwnd) = session.target()
        {
            win32::restore_without_activate_if_iconic(hwnd);
        }
        session.grab()
    }

    /// Registers `consumer_id` against the shared cache and returns a view
    /// of the latest frame, if fresh.
    pub fn get_shared_frame(&self, consumer_id: &str) -> Option<SharedFrameView> {
        self.cache.get(consumer_id, None)
    }

    pub fn release_shared_frame(&self, consumer_id: &str) {
        self.cache.release(consumer_id);
    }

    /// Rebuilds the live session with new capture options. The old session
    /// is fully stopped before the new one starts; no reference to it is
    /// retained.
    pub fn reconfigure(&mut self, config: CaptureManagerConfig) -> Result<()> {
        self.config = config;
        if let Some(session) = self.session.take() {
            let target = session.target();
            session.stop(Duration::from_millis(1200))?;
            let new_session = CaptureSession::start(target, self.config.into(), self.cache.clone())?;
            self.session = Some(new_session);
        }
        Ok(())
    }

    pub fn health(&self) -> Option<HealthSnapshot> {
        self.session.as_ref().map(|s| s.health())
    }

    /// The actually-resolved target of the live session, if one is open.
    /// This can differ from the `TargetSpec` passed to `open()`: a
    /// `Title`/`ProcessName` spec resolves to a concrete window handle the
    /// first time a session starts against it.
    pub fn current_target(&self) -> Option<CaptureTarget> {
        self.session.as_ref().map(|s| s.target())
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn close(&mut self, join_timeout: Duration) {
        if let Some(session) = self.session.take()
            && let Err(e) = session.stop(join_timeout)
        {
            log::warn!("error stopping capture session: {e}");
        }
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.close(Duration::from_millis(1200));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_matches_respects_partial_flag() {
        assert!(title_matches("Visual Studio Code", "studio", true));
        assert!(!title_matches("Visual Studio Code", "studio", false));
        assert!(title_matches("Notepad", "Notepad", false));
    }

    #[test]
    fn name_matches_is_case_insensitive() {
        assert!(name_matches("Notepad.EXE", "notepad.exe", false));
    }

    #[test]
    fn resolve_monitor_target_out_of_range_errors() {
        let err = resolve_target(&TargetSpec::Monitor { index: 9_999 }).unwrap_err();
        assert!(matches!(err, CaptureError::MonitorIndexOutOfRange(9_999)));
    }
}
