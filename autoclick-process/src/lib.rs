//! ScannerProcessManager (C8): spawns and supervises the
//! `autoclick-scanner-worker` subprocess.

pub mod channels;
pub mod error;
pub mod manager;
pub mod polling;
pub mod watchdog;

pub use error::{ProcessError, Result};
pub use manager::{PollOutcome, ScannerProcessManager};
pub use polling::{AdaptivePollTimer, PollingConfig};
pub use watchdog::WatchdogConfig;
