//! AppLifecycle (C10): process-wide shutdown coordination.

pub mod lifecycle;

pub use lifecycle::AppLifecycle;
