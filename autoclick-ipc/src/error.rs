//! Typed error type for the shared IPC/data-model crate.

use thiserror::Error;

/// Errors that can arise while encoding, decoding, or validating the wire
/// protocol and shared data types.
#[derive(Debug, Error)]
pub enum IpcError {
    /// A wire line could not be parsed as JSON.
    #[error("malformed IPC envelope: {0}")]
    Decode(#[from] serde_json::Error),

    /// The wire connection was closed while a read or write was in flight.
    #[error("IPC connection closed: {0}")]
    ConnectionClosed(String),

    /// A `ScannerConfig` field failed validation at the `update_config`
    /// boundary.
    #[error("invalid scanner config: {0}")]
    InvalidConfig(String),

    /// An ROI spec was shaped in a way none of the accepted on-disk forms
    /// cover (`{left,top,right,bottom}`, `[l,t,r,b]`, `{x,y,w,h}`).
    #[error("invalid ROI shape: {0}")]
    InvalidRoi(String),
}

pub type Result<T> = std::result::Result<T, IpcError>;
