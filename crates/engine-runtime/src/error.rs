use crate::settings::SettingsError;
use connectors::{
    error::SourceError,
    file::csv::error::ArtifactError,
    storage::PublishError,
};
use engine_core::error::{CursorStoreError, FetchError};
use model::core::identifiers::DatasetKey;
use std::{fmt, time::Duration};
use thiserror::Error;

/// Step of a sync unit that a deadline applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Append,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => f.write_str("fetch"),
            Stage::Append => f.write_str("append"),
            Stage::Publish => f.write_str("publish"),
        }
    }
}

/// Why a single dataset failed. Never affects sibling datasets.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("[{key}] connectivity failure: {message}")]
    Connectivity { key: DatasetKey, message: String },

    #[error("[{key}] malformed data: {message}")]
    Decode { key: DatasetKey, message: String },

    #[error("[{key}] persistence failure: {message}")]
    Persistence { key: DatasetKey, message: String },

    #[error("[{key}] {stage} exceeded {limit:?}")]
    Timeout {
        key: DatasetKey,
        stage: Stage,
        limit: Duration,
    },

    #[error("[{key}] cancelled")]
    Cancelled { key: DatasetKey },

    #[error("[{key}] task failed: {message}")]
    Join { key: DatasetKey, message: String },

    #[error("[{key}] artifact {artifact} is already written by {owner}")]
    Conflict {
        key: DatasetKey,
        artifact: String,
        owner: DatasetKey,
    },
}

impl SyncError {
    pub fn key(&self) -> &DatasetKey {
        match self {
            SyncError::Connectivity { key, .. }
            | SyncError::Decode { key, .. }
            | SyncError::Persistence { key, .. }
            | SyncError::Timeout { key, .. }
            | SyncError::Cancelled { key }
            | SyncError::Join { key, .. }
            | SyncError::Conflict { key, .. } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Connectivity { .. } => "connectivity",
            SyncError::Decode { .. } => "decode",
            SyncError::Persistence { .. } => "persistence",
            SyncError::Timeout { .. } => "timeout",
            SyncError::Cancelled { .. } => "cancelled",
            SyncError::Join { .. } => "join",
            SyncError::Conflict { .. } => "conflict",
        }
    }

    pub fn from_fetch(key: DatasetKey, err: FetchError) -> Self {
        let message = err.to_string();
        match err {
            FetchError::Connectivity(_) => SyncError::Connectivity { key, message },
            FetchError::Decode(_) | FetchError::CursorMismatch { .. } => {
                SyncError::Decode { key, message }
            }
        }
    }

    pub fn from_publish(key: DatasetKey, err: PublishError) -> Self {
        let message = err.to_string();
        match err {
            PublishError::Connectivity(_) => SyncError::Connectivity { key, message },
            PublishError::Io(_) | PublishError::InvalidUrl(_) | PublishError::Config(_) => {
                SyncError::Persistence { key, message }
            }
        }
    }

    pub fn from_artifact(key: DatasetKey, err: ArtifactError) -> Self {
        SyncError::Persistence {
            key,
            message: err.to_string(),
        }
    }

    pub fn from_commit(key: DatasetKey, err: CommitError) -> Self {
        SyncError::Persistence {
            key,
            message: err.to_string(),
        }
    }
}

/// Failure to get a cursor acknowledged by the aggregator.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Cursor store rejected the commit: {0}")]
    Store(#[from] CursorStoreError),

    #[error("Cursor aggregator unavailable: {0}")]
    Aggregator(#[from] ActorError),
}

/// Failures that abort a whole run before or after the units execute.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Document store error: {0}")]
    Source(#[from] SourceError),

    #[error("Cursor store error: {0}")]
    Store(#[from] CursorStoreError),

    #[error("Publisher error: {0}")]
    Publish(#[from] PublishError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Initialization error: {0}")]
    Initialization(String),
}

/// Common error type for all actors in the engine.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Mailbox closed")]
    MailboxClosed,

    #[error("Actor internal error: {0}")]
    Internal(String),
}
