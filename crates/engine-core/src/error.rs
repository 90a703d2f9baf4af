use connectors::error::SourceError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CursorStoreError {
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode cursor: {0}")]
    Codec(String),

    #[error("Cursor file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl From<bincode::Error> for CursorStoreError {
    fn from(err: bincode::Error) -> Self {
        CursorStoreError::Codec(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Source unavailable: {0}")]
    Connectivity(String),

    #[error("Malformed source data: {0}")]
    Decode(String),

    #[error("Cursor '{found}' is not a valid {expected} cursor")]
    CursorMismatch { expected: &'static str, found: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Connectivity(_))
    }
}

impl From<SourceError> for FetchError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Connectivity(msg) => FetchError::Connectivity(msg),
            SourceError::Decode(msg) => FetchError::Decode(msg),
            SourceError::NotFound(what) => FetchError::Decode(format!("{what} not found")),
        }
    }
}
