//! Resolves a template `source_ref` (an absolute/relative filesystem path,
//! or a `blob://category/name` reference) to raw, still-encoded image
//! bytes. Decoding into pixels is [`autoclick_match::TemplateCache`]'s job;
//! this module only knows how to fetch bytes.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

const BLOB_SCHEME: &str = "blob://";

/// A resolved template reference, split into its two accepted forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Path(PathBuf),
    Blob { category: String, name: String },
}

impl TemplateRef {
    pub fn parse(source_ref: &str) -> Self {
        if let Some(rest) = source_ref.strip_prefix(BLOB_SCHEME) {
            let mut parts = rest.splitn(2, '/');
            let category = parts.next().unwrap_or_default().to_string();
            let name = parts.next().unwrap_or_default().to_string();
            TemplateRef::Blob { category, name }
        } else {
            TemplateRef::Path(PathBuf::from(source_ref))
        }
    }
}

/// Out-of-scope collaborator boundary: the on-disk blob store backing
/// `blob://category/name` references lives outside this system (it is
/// SQLite-backed in the original), so it is modeled here only as a trait
/// other crates can supply a concrete adapter for.
pub trait BlobStore: Send + Sync {
    fn get(&self, category: &str, name: &str) -> Result<Vec<u8>>;
}

/// Loads template bytes from either the filesystem or an injected
/// [`BlobStore`].
pub struct TemplateSourceLoader {
    app_root: PathBuf,
    blob_store: Option<Box<dyn BlobStore>>,
}

impl TemplateSourceLoader {
    pub fn new(app_root: impl Into<PathBuf>) -> Self {
        Self {
            app_root: app_root.into(),
            blob_store: None,
        }
    }

    pub fn with_blob_store(mut self, store: Box<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    /// Resolves `source_ref` to raw bytes. Filesystem paths are tried as
    /// absolute first, then relative to `app_root`.
    pub fn load(&self, source_ref: &str) -> Result<Vec<u8>> {
        match TemplateRef::parse(source_ref) {
            TemplateRef::Path(path) => self.load_path(&path, source_ref),
            TemplateRef::Blob { category, name } => {
                let store = self
                    .blob_store
                    .as_deref()
                    .ok_or_else(|| ConfigError::TemplateNotFound(source_ref.to_string()))?;
                store.get(&category, &name)
            }
        }
    }

    fn load_path(&self, path: &Path, source_ref: &str) -> Result<Vec<u8>> {
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.app_root.join(path)
        };
        std::fs::read(&candidate).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::TemplateNotFound(source_ref.to_string())
            } else {
                ConfigError::Read {
                    path: candidate.display().to_string(),
                    source,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_blob_reference() {
        let parsed = TemplateRef::parse("blob://icons/ok-button");
        assert_eq!(
            parsed,
            TemplateRef::Blob {
                category: "icons".into(),
                name: "ok-button".into()
            }
        );
    }

    #[test]
    fn parses_plain_path_reference() {
        let parsed = TemplateRef::parse("templates/ok.png");
        assert_eq!(parsed, TemplateRef::Path(PathBuf::from("templates/ok.png")));
    }

    #[test]
    fn loads_relative_path_against_app_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.png"), b"fake-bytes").unwrap();
        let loader = TemplateSourceLoader::new(dir.path());
        let bytes = loader.load("ok.png").unwrap();
        assert_eq!(bytes, b"fake-bytes");
    }

    #[test]
    fn missing_path_reports_template_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TemplateSourceLoader::new(dir.path());
        let err = loader.load("missing.png").unwrap_err();
        assert!(matches!(err, ConfigError::TemplateNotFound(_)));
    }

    #[test]
    fn blob_reference_without_store_reports_not_found() {
        let loader = TemplateSourceLoader::new(".");
        let err = loader.load("blob://icons/ok").unwrap_err();
        assert!(matches!(err, ConfigError::TemplateNotFound(_)));
    }
}
