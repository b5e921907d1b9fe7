use std::path::PathBuf;
use thiserror::Error;

use crate::error::ArgsError;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read {}: {source}", .path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid rule {index} in class `{class}`: {source}")]
    InvalidRule {
        class: String,
        index: usize,
        #[source]
        source: ArgsError,
    },

    #[error("Class not found: {0}")]
    ClassNotFound(String),
}
