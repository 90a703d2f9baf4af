use mongodb::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The document store could not be reached or the query failed in transit.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A record, identifier or freshness marker could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The dataset is no longer present in the catalog.
    #[error("Dataset not found in catalog: {0}")]
    NotFound(String),
}

impl SourceError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SourceError::Connectivity(_))
    }
}

impl From<mongodb::error::Error> for SourceError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
                SourceError::Decode(err.to_string())
            }
            _ => SourceError::Connectivity(err.to_string()),
        }
    }
}
