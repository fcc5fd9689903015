//! Graphics capture: the shared frame cache (C1), the capture session
//! wrapping the native OS capture surface (C2), and the capture manager
//! that resolves targets and owns one live session (C3).

pub mod cache;
pub mod error;
pub mod frame;
pub mod manager;
pub mod session;
pub mod win32;

pub use cache::{CacheStats, ConsumerId, SharedFrameCache, SharedFrameView};
pub use error::{CaptureError, Result};
pub use frame::{ContentSize, Frame};
pub use manager::{CaptureManager, CaptureManagerConfig, MonitorInfo, list_monitors, resolve_target};
pub use session::{CaptureSession, CaptureSessionConfig, CaptureTarget, HealthSnapshot};
