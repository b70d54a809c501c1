//! Error types for datalogs-core.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatalogsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad logger construction or naming.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Structurally inconsistent log payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// A value the converter cannot represent as JSON.
    #[error("cannot convert value of type '{type_name}' at {path} to JSON")]
    UnsupportedType { type_name: String, path: String },

    #[error("'{0}' file extension is not supported")]
    UnsupportedFormat(String),

    #[error("'{}' is not a {expected} log", path.display())]
    FormatMismatch { path: PathBuf, expected: &'static str },

    #[error("log '{}' already exists", .0.display())]
    LogExists(PathBuf),

    #[error("cannot tag log '{log}' with most recent commit because commit store '{store}' is empty")]
    EmptyCommitStore { log: String, store: String },

    /// Failure reported by a [`CommitStore`](crate::CommitStore) implementation.
    #[error("commit store error: {0}")]
    CommitStore(String),
}

pub type Result<T> = std::result::Result<T, DatalogsError>;
