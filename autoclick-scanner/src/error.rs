use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error(transparent)]
    Ipc(#[from] autoclick_ipc::IpcError),

    #[error(transparent)]
    Config(#[from] autoclick_config::ConfigError),

    #[error(transparent)]
    Capture(#[from] autoclick_capture::CaptureError),

    #[error(transparent)]
    Match(#[from] autoclick_match::MatchError),

    #[error(transparent)]
    Click(#[from] autoclick_click::ClickError),
}

pub type Result<T> = std::result::Result<T, ScannerError>;
