use crate::error::CursorStoreError;
use async_trait::async_trait;
use model::{core::identifiers::DatasetKey, pagination::cursor::Cursor};
use std::collections::HashMap;

pub mod json_store;
pub mod sled_store;

pub use json_store::JsonFileCursorStore;
pub use sled_store::SledCursorStore;

/// Cursor of every dataset that has synced at least once.
pub type Snapshot = HashMap<DatasetKey, Cursor>;

/// Durable home of the per-dataset cursors.
///
/// Every write merges by key: keys that are not mentioned are left untouched,
/// so concurrent writers for different datasets never erase each other.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Loads all cursors. A store that was never written is an empty snapshot.
    async fn load(&self) -> Result<Snapshot, CursorStoreError>;

    /// Writes every entry of `snapshot` in one crash-atomic step.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), CursorStoreError>;

    async fn upsert(&self, key: &DatasetKey, cursor: &Cursor) -> Result<(), CursorStoreError>;

    /// Drops the cursor of `key`; `false` when there was none.
    async fn remove(&self, key: &DatasetKey) -> Result<bool, CursorStoreError>;

    async fn get(&self, key: &DatasetKey) -> Result<Option<Cursor>, CursorStoreError> {
        Ok(self.load().await?.remove(key))
    }
}
