use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("Artifact {0} has no header row")]
    MissingHeader(String),

    #[error("Cannot derive a header from an empty batch")]
    EmptyBatch,

    #[error("Batch for {0} has no field besides the hidden identity")]
    EmptyHeader(String),
}
