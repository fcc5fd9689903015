use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Ipc(#[from] autoclick_ipc::IpcError),

    #[error("failed to spawn scanner-worker subprocess: {0}")]
    Spawn(std::io::Error),

    #[error("scanner-worker did not signal readiness after {attempts} attempt(s)")]
    StartupTimedOut { attempts: u32 },

    #[error("a session is already running")]
    AlreadyRunning,

    #[error("no session is running")]
    NotRunning,

    #[error("failed to write command to scanner-worker stdin: {0}")]
    Write(String),
}

pub type Result<T> = std::result::Result<T, ProcessError>;
