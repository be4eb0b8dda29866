use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a catalog run
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write catalog {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize catalog {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
