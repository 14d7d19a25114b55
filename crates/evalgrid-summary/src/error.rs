//! Error types for summarization.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for summary operations.
pub type Result<T> = std::result::Result<T, SummaryError>;
