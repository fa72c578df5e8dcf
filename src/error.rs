//! Error types for riglog
//!
//! Polling-path degeneracies (under-sampled rate, empty windows) are NOT
//! errors and never appear here: they are normalized to zero/empty results
//! so periodic callers have a uniform non-failing contract. This enum
//! covers the synchronous failures: configuration errors (bad export
//! format), schema violations, and IO/serialization faults.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// riglog error types
#[derive(Error, Debug)]
pub enum Error {
    /// Schema is only known once data exists for the current epoch
    #[error("accumulator '{0}' is empty: columns are not known until the first record of the epoch")]
    EmptyAccumulator(String),

    /// Record values do not match the declared schema
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Export requested with a format name we do not implement
    #[error("'{0}' is not an implemented log format (expected csv, feather, parquet or json)")]
    UnsupportedFormat(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error (Feather/IPC export)
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error (compressed table export)
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
