use crate::error::CommitError;
use engine_core::state::Snapshot;
use model::{core::identifiers::DatasetKey, pagination::cursor::Cursor};
use tokio::sync::oneshot;

/// Messages for the cursor aggregator actor.
#[derive(Debug)]
pub enum AggregatorMsg {
    /// Persist `cursor` for `key`, then answer on `ack`.
    Commit {
        key: DatasetKey,
        cursor: Cursor,
        ack: oneshot::Sender<Result<(), CommitError>>,
    },

    /// Copy of the cursors as of now.
    Snapshot { reply: oneshot::Sender<Snapshot> },
}
