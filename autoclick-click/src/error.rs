use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClickError {
    #[error("no window exists at the requested point")]
    WindowGone,

    #[error("target window is disabled")]
    WindowDisabled,

    #[error("point ({0}, {1}) does not fall within any known monitor")]
    OutOfMonitorBounds(i32, i32),

    #[error("failed to post message: {0}")]
    PostMessage(String),

    #[error("clicking requires Windows")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, ClickError>;
