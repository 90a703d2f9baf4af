use connectors::error::SourceError;
use engine_core::error::CursorStoreError;
use engine_runtime::{error::RuntimeError, settings::SettingsError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Sync run failed: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Cursor store error: {0}")]
    Store(#[from] CursorStoreError),

    #[error("Document store error: {0}")]
    Source(#[from] SourceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("No cursor stored for dataset '{0}'")]
    UnknownDataset(String),
}
