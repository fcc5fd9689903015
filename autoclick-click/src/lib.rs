//! ClickEmitter (C6): synthetic click delivery via `PostMessageW`, never
//! moving the real system cursor.

pub mod emitter;
pub mod error;

pub use emitter::{ClickEmitter, ClientClickOptions, ScreenClickOptions};
pub use error::{ClickError, Result};
