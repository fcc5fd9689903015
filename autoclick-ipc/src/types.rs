//! Plain data records shared between the controller and scanner processes.
//!
//! Everything here is `Serialize`/`Deserialize` and carries no process-local
//! handles other than `target_hwnd`, which is an integer the receiving
//! process must re-validate rather than trust.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{IpcError, Result};

/// Dimensions of the pixel data currently produced by a capture surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSize {
    pub width: u32,
    pub height: u32,
}

impl ContentSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A rectangle in capture-content coordinates. Absent means "full frame".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Roi {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_positive(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    /// Clamp this ROI to lie within `(0, 0, width, height)`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Roi {
        Roi {
            left: self.left.clamp(0, width as i32),
            top: self.top.clamp(0, height as i32),
            right: self.right.clamp(0, width as i32),
            bottom: self.bottom.clamp(0, height as i32),
        }
    }
}

/// Accepts the three on-disk ROI shapes named in the configuration surface:
/// `{left,top,right,bottom}`, `[l,t,r,b]`, and `{x,y,w,h}`.
impl<'de> Deserialize<'de> for RoiConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawRoi {
            Ltrb {
                left: i32,
                top: i32,
                right: i32,
                bottom: i32,
            },
            Xywh {
                x: i32,
                y: i32,
                w: i32,
                h: i32,
            },
            Array([i32; 4]),
        }

        let raw = RawRoi::deserialize(deserializer)?;
        let roi = match raw {
            RawRoi::Ltrb {
                left,
                top,
                right,
                bottom,
            } => Roi {
                left,
                top,
                right,
                bottom,
            },
            RawRoi::Xywh { x, y, w, h } => Roi {
                left: x,
                top: y,
                right: x + w,
                bottom: y + h,
            },
            RawRoi::Array([left, top, right, bottom]) => Roi {
                left,
                top,
                right,
                bottom,
            },
        };
        Ok(RoiConfig(roi))
    }
}

impl Serialize for RoiConfig {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// Newtype wrapping [`Roi`] so config parsing can accept the three
/// historical on-disk shapes while the rest of the crate works with a
/// single canonical representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiConfig(pub Roi);

/// A target window or monitor identifier, modeled as a tagged variant
/// rather than a stringly-typed parameter (per the resolver re-architecture
/// guidance: avoid "partial-match" boolean overloading of a single string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TargetSpec {
    Handle { hwnd: u64 },
    Title { text: String, partial: bool },
    ProcessName { text: String, partial: bool },
    Monitor { index: u32 },
}

/// The outcome of resolving a frame's capture mode, used to interpret
/// [`MatchHit`] coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    Window,
    Monitor,
}

/// A single best-match result from the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchHit {
    pub score: f32,
    pub x: i32,
    pub y: i32,
    pub template_w: u32,
    pub template_h: u32,
    pub timestamp_ms: i64,
    pub capture_mode: CaptureMode,
}

/// Per-strategy enable flags for [`crate::types::TargetSpec`] resolution in
/// the target finder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinderStrategies {
    #[serde(default = "default_true")]
    pub process_basename: bool,
    #[serde(default = "default_true")]
    pub process_path: bool,
    #[serde(default = "default_true")]
    pub window_title: bool,
    #[serde(default = "default_true")]
    pub window_class: bool,
    #[serde(default = "default_true")]
    pub fuzzy_title: bool,
}

impl Default for FinderStrategies {
    fn default() -> Self {
        Self {
            process_basename: true,
            process_path: true,
            window_title: true,
            window_class: true,
            fuzzy_title: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Additional pixel offset applied to a match center before clicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClickOffset {
    pub dx: i32,
    pub dy: i32,
}

/// An immutable snapshot of everything the scanner worker needs to run one
/// session. Serialized by value across the process boundary; the child must
/// re-validate `target_hwnd` rather than trust it, since it may have become
/// stale between the controller serializing it and the child starting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub target_spec: TargetSpec,
    pub template_refs: Vec<String>,
    pub roi: Option<Roi>,
    pub threshold: f32,
    pub grayscale: bool,
    pub interval_ms: u64,
    pub fps_max: u32,
    pub include_cursor: bool,
    pub border_required: bool,
    pub restore_minimized: bool,
    pub click_offset: ClickOffset,
    pub click_delay_ms: u64,
    pub enhanced_window_finding: bool,
    pub verify_window_before_click: bool,
    pub send_mousemove_before_click: bool,
    pub debug_mode: bool,
}

impl ScannerConfig {
    /// Rejects malformed or inconsistent configuration at the
    /// `update_config` boundary, per the Config error-handling policy: the
    /// worker must not enter the Running state on an invalid config.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(IpcError::InvalidConfig(format!(
                "threshold {} must be within [0, 1]",
                self.threshold
            )));
        }
        if self.template_refs.is_empty() {
            return Err(IpcError::InvalidConfig(
                "template_refs must not be empty".into(),
            ));
        }
        if self.fps_max == 0 || self.fps_max > 60 {
            return Err(IpcError::InvalidConfig(format!(
                "fps_max {} must be within [1, 60]",
                self.fps_max
            )));
        }
        if let Some(roi) = self.roi
            && !roi.is_positive()
            && (roi.left, roi.top, roi.right, roi.bottom) != (0, 0, 0, 0)
        {
            return Err(IpcError::InvalidConfig(
                "roi must have positive width and height, or be entirely zeroed".into(),
            ));
        }
        Ok(())
    }

    /// Interval clamped to at least 1ms, per the `interval_ms = 0` boundary
    /// behavior: the worker must still yield and never busy-poll.
    pub fn effective_interval_ms(&self) -> u64 {
        self.interval_ms.max(1)
    }
}

/// A point-in-time progress report emitted by the scanner subprocess. The
/// first one carrying `running: true` is the readiness handshake the
/// controller's startup watchdog waits on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerStatus {
    pub running: bool,
    pub phase_text: String,
    pub backend_label: String,
    pub detail: String,
    pub scan_count: u64,
    pub error_message: Option<String>,
    pub timestamp_ms: i64,
}

/// Command sent from the controller down to the scanner subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScannerCommand {
    Start { config: ScannerConfig },
    Stop,
    UpdateConfig { config: ScannerConfig },
    Exit,
}

/// A log line forwarded from the scanner subprocess to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub text: String,
}

/// Window lifecycle transitions observed by the OS event hook inside the
/// target finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WindowEvent {
    Foreground { hwnd: u64 },
    CreateOrShow { hwnd: u64 },
    NameChange { hwnd: u64 },
}

/// Monotonically increasing token identifying a start-stop lifetime of the
/// scanner subprocess. A callback scheduled under one token must no-op if
/// the current token has since advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub u64);

impl SessionToken {
    pub const INITIAL: SessionToken = SessionToken(0);

    pub fn next(self) -> SessionToken {
        SessionToken(self.0 + 1)
    }
}

/// Resolver strategy bookkeeping: `(success_count, failure_count,
/// last_used)` per strategy name, used to bias future search ordering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyStats {
    pub entries: HashMap<String, StrategyRecord>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub success_count: u64,
    pub failure_count: u64,
    pub last_used_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roi_clamp_shrinks_out_of_bounds_rect() {
        let roi = Roi {
            left: -10,
            top: -10,
            right: 500,
            bottom: 500,
        };
        let clamped = roi.clamp_to(100, 80);
        assert_eq!(clamped, Roi { left: 0, top: 0, right: 100, bottom: 80 });
    }

    #[test]
    fn roi_config_accepts_ltrb_array_and_xywh() {
        let ltrb: RoiConfig = serde_json::from_str(r#"{"left":1,"top":2,"right":3,"bottom":4}"#).unwrap();
        assert_eq!(ltrb.0, Roi { left: 1, top: 2, right: 3, bottom: 4 });

        let arr: RoiConfig = serde_json::from_str("[1,2,3,4]").unwrap();
        assert_eq!(arr.0, Roi { left: 1, top: 2, right: 3, bottom: 4 });

        let xywh: RoiConfig = serde_json::from_str(r#"{"x":1,"y":2,"w":10,"h":20}"#).unwrap();
        assert_eq!(xywh.0, Roi { left: 1, top: 2, right: 11, bottom: 22 });
    }

    #[test]
    fn session_token_advances_monotonically() {
        let a = SessionToken::INITIAL;
        let b = a.next();
        assert!(b > a);
        assert_eq!(b.0, 1);
    }

    #[test]
    fn scanner_config_rejects_out_of_range_threshold() {
        let mut cfg = sample_config();
        cfg.threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn scanner_config_rejects_empty_templates() {
        let mut cfg = sample_config();
        cfg.template_refs.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn scanner_config_effective_interval_never_zero() {
        let mut cfg = sample_config();
        cfg.interval_ms = 0;
        assert_eq!(cfg.effective_interval_ms(), 1);
    }

    fn sample_config() -> ScannerConfig {
        ScannerConfig {
            target_spec: TargetSpec::Monitor { index: 0 },
            template_refs: vec!["templates/a.png".into()],
            roi: None,
            threshold: 0.85,
            grayscale: false,
            interval_ms: 100,
            fps_max: 30,
            include_cursor: false,
            border_required: false,
            restore_minimized: false,
            click_offset: ClickOffset::default(),
            click_delay_ms: 500,
            enhanced_window_finding: true,
            verify_window_before_click: true,
            send_mousemove_before_click: false,
            debug_mode: false,
        }
    }
}
