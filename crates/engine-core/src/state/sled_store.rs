use crate::{
    error::CursorStoreError,
    state::{CursorStore, Snapshot},
};
use async_trait::async_trait;
use model::{core::identifiers::DatasetKey, pagination::cursor::Cursor};
use std::path::Path;
use tracing::debug;

const CURSOR_PREFIX: &str = "cursor:";

/// Embedded store keeping one sled entry per dataset.
pub struct SledCursorStore {
    db: sled::Db,
}

impl SledCursorStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CursorStoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn cursor_key(key: &DatasetKey) -> String {
        format!("{CURSOR_PREFIX}{key}")
    }
}

#[async_trait]
impl CursorStore for SledCursorStore {
    async fn load(&self) -> Result<Snapshot, CursorStoreError> {
        let mut snapshot = Snapshot::new();

        for item in self.db.scan_prefix(CURSOR_PREFIX) {
            let (raw_key, value) = item?;
            let key = String::from_utf8_lossy(&raw_key[CURSOR_PREFIX.len()..]).into_owned();
            let cursor: Cursor = bincode::deserialize(&value)?;
            snapshot.insert(DatasetKey::from(key), cursor);
        }

        Ok(snapshot)
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), CursorStoreError> {
        let mut batch = sled::Batch::default();
        for (key, cursor) in snapshot {
            batch.insert(Self::cursor_key(key).as_bytes(), bincode::serialize(cursor)?);
        }

        self.db.apply_batch(batch)?;
        self.db.flush()?;
        debug!("Saved {} cursors", snapshot.len());
        Ok(())
    }

    async fn upsert(&self, key: &DatasetKey, cursor: &Cursor) -> Result<(), CursorStoreError> {
        let value = bincode::serialize(cursor)?;
        self.db.insert(Self::cursor_key(key), value)?;
        self.db.flush()?;
        Ok(())
    }

    async fn remove(&self, key: &DatasetKey) -> Result<bool, CursorStoreError> {
        let removed = self.db.remove(Self::cursor_key(key))?.is_some();
        self.db.flush()?;
        Ok(removed)
    }

    async fn get(&self, key: &DatasetKey) -> Result<Option<Cursor>, CursorStoreError> {
        match self.db.get(Self::cursor_key(key))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}
