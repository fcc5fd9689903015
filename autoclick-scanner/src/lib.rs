//! ScannerWorker (C7): the capture -> match -> click scan loop, run either
//! in-process or by the `autoclick-scanner-worker` subprocess binary.

pub mod error;
pub mod worker;

pub use error::{Result, ScannerError};
pub use worker::{ScannerWorker, TickOutcome};
