//! Error types for LAS decoding

use thiserror::Error;

/// Errors produced while decoding a LAS file
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("header too short: got {len} bytes, need {need}")]
    TooShort { len: usize, need: usize },

    #[error("bad header layout: {0}")]
    BadLayout(String),
}

impl From<DecodeError> for lascache_core::Error {
    fn from(err: DecodeError) -> Self {
        lascache_core::Error::InvalidData(err.to_string())
    }
}
