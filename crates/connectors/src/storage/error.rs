use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Object storage request failed: {0}")]
    Connectivity(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

impl PublishError {
    /// Transport-level failures that are worth retrying within a run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PublishError::Connectivity(object_store::Error::Generic { .. })
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PublishError::Connectivity(object_store::Error::NotFound { .. })
        )
    }
}
