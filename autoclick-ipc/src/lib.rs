//! Shared data model and wire protocol between the controller process and
//! the scanner subprocess.
//!
//! Nothing in this crate touches the OS; it is pure data plus (de)serializer
//! plumbing so that both sides of the process boundary agree on shapes.

pub mod channel;
pub mod error;
pub mod types;
pub mod wire;

pub use error::{IpcError, Result};
pub use types::{
    CaptureMode, ClickOffset, ContentSize, FinderStrategies, LogLine, MatchHit, Roi, RoiConfig,
    ScannerCommand, ScannerConfig, ScannerStatus, SessionToken, StrategyRecord, StrategyStats,
    TargetSpec, WindowEvent,
};
pub use wire::Envelope;
