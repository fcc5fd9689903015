//! Template cache (C4) and normalized cross-correlation matcher (C5).

pub mod cache;
pub mod error;
pub mod matcher;

pub use cache::{DecodedTemplate, TemplateCache};
pub use error::{MatchError, Result};
pub use matcher::Matcher;
