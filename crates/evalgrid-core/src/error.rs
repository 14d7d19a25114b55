//! Error types for evalgrid-core.

use std::path::PathBuf;

/// Configuration validation failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must contain at least one entry")]
    EmptyList { field: &'static str },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("invalid {kind} identifier {value:?}: {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("duplicate {kind} identifier: {value}")]
    Duplicate { kind: &'static str, value: String },
}

/// Errors surfaced by evalgrid-core operations.
#[derive(Debug, thiserror::Error)]
pub enum EvalGridError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render config: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for evalgrid-core operations.
pub type Result<T> = std::result::Result<T, EvalGridError>;
