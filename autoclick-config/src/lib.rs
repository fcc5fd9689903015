//! Configuration loading, template source resolution, DPI queries, and
//! logging setup — the thin external-adapter boundary (C12) named in the
//! system overview.

pub mod defaults;
pub mod doc;
pub mod dpi;
pub mod error;
pub mod logging;
pub mod templates;

pub use doc::ConfigDoc;
pub use error::{ConfigError, Result};
pub use templates::{BlobStore, TemplateRef, TemplateSourceLoader};
