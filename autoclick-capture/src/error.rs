use thiserror::Error;

/// Error kinds from the capture side of the pipeline. Matches the
/// `TargetUnavailable` / `CaptureStart` / `CaptureFrame` taxonomy: a
/// `CaptureStart` failure is fatal for that attempt and must never trigger
/// a fallback to a legacy screen-blit mechanism, while a `CaptureFrame`
/// failure is logged and the session stays alive.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no window matched the target")]
    TargetNotFound,

    #[error("window handle {0} is not a valid window")]
    InvalidHandle(u64),

    #[error("monitor index {0} is out of range")]
    MonitorIndexOutOfRange(u32),

    #[error("native graphics-capture session failed to start: {0}")]
    CaptureStart(String),

    #[error("capture callback failed to process a frame: {0}")]
    CaptureFrame(String),

    #[error("session shutdown did not complete within the join timeout")]
    StopTimeout,

    #[error("the capture session is unhealthy: {0}")]
    Unhealthy(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
