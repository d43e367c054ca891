//! Error types for the corpus pipeline.
//!
//! Only [`PipelineError::Format`] and [`PipelineError::Configuration`] are
//! fatal at their scope (one catalog file, one batch). Field and image decode
//! errors are built, logged and dropped where they happen.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Catalog stream is malformed beyond recovery
    #[error("format error in {source_file} at byte {offset}: {reason}")]
    Format {
        source_file: String,
        offset: usize,
        reason: String,
    },

    /// One field of an otherwise valid record is corrupt
    #[error("field {tag} decode error: {reason}")]
    FieldDecode { tag: String, reason: String },

    /// One embedded image could not be decoded
    #[error("image decode error in {document} (page {page}, image {index}): {reason}")]
    ImageDecode {
        document: PathBuf,
        page: usize,
        index: usize,
        reason: String,
    },

    /// Empty corpus, impossible aggregate statistics, invalid settings
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("pdf error in {document}: {source}")]
    Pdf {
        document: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PipelineError {
    pub(crate) fn format(source_file: &str, offset: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            source_file: source_file.to_string(),
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn field(tag: &str, reason: impl Into<String>) -> Self {
        Self::FieldDecode {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }
}
