use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("window enumeration failed: {0}")]
    Enumeration(#[from] autoclick_capture::CaptureError),

    #[error("failed to register the window event hook: {0}")]
    HookRegistration(String),

    #[error("event hook requires Windows")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, FinderError>;
