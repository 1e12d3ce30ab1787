//! Error taxonomy.
//!
//! | Error | Raised when | HTTP |
//! |-------|-------------|------|
//! | [`ParseError`] | the uploaded stream is unreadable or malformed | 500 |
//! | [`InsertError`] | the store rejects a batch transaction | 500 |
//! | [`ValidationError`] | the request is missing input | 400 |
//! | [`ConfigError`] | configuration is missing or invalid | fatal |
//!
//! None of these are retried. Batches committed before a failure stay
//! committed.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Csv(#[from] csv_async::Error),
    #[error("duplicate header: {0}")]
    DuplicateHeader(String),
    #[error("column header mismatch on line {line}: expected {expected} columns, got {got}")]
    ColumnMismatch { line: u64, expected: usize, got: usize },
}

/// A batch transaction failed and was rolled back.
#[derive(Debug, Error)]
#[error("insert of {rows} rows failed: {source}")]
pub struct InsertError {
    pub rows: usize,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No file provided")]
    MissingFile,
    #[error("invalid upload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Missing required env var {0}")]
    MissingEnv(String),
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: String, value: String },
    #[error("{0}")]
    Invalid(String),
}

/// Failure reported by a [`RowStore`](crate::store::RowStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Rejected(String),
}

/// Terminal failure of one upload.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Insert(#[from] InsertError),
}
