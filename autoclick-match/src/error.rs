use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("failed to load template '{source_ref}': {detail}")]
    TemplateLoad { source_ref: String, detail: String },

    #[error("failed to decode template image: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Config(#[from] autoclick_config::ConfigError),
}

pub type Result<T> = std::result::Result<T, MatchError>;
