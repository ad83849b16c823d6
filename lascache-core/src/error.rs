//! Error types for lascache

use thiserror::Error;

/// Main error type for lascache operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("conversion task failed: {0}")]
    TaskFailed(String),
}

/// Result type alias for lascache operations
pub type Result<T> = std::result::Result<T, Error>;
