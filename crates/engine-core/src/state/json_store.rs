use crate::{
    error::CursorStoreError,
    state::{CursorStore, Snapshot},
};
use async_trait::async_trait;
use model::{core::identifiers::DatasetKey, pagination::cursor::Cursor};
use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
};
use tokio::{io::AsyncWriteExt, sync::Mutex};
use tracing::debug;

/// Cursor file holding a flat JSON object `{ "<dataset key>": "<cursor>" }`.
///
/// Writes are read-modify-write under a lock and land through a sibling temp
/// file that is fsynced and then renamed over the target, so a reader sees
/// either the old or the new file, never a torn one.
pub struct JsonFileCursorStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileCursorStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a cursor file written by an older release. Its timestamps are
    /// full RFC 3339 values rather than the fixed second-precision format.
    pub async fn read_legacy(path: &Path) -> Result<Snapshot, CursorStoreError> {
        let entries = read_entries(path).await?;
        Ok(entries
            .into_iter()
            .map(|(key, value)| (DatasetKey::from(key), Cursor::from_legacy(&value)))
            .collect())
    }

    async fn read(&self) -> Result<Snapshot, CursorStoreError> {
        let entries = read_entries(&self.path).await?;
        Ok(entries
            .into_iter()
            .map(|(key, value)| (DatasetKey::from(key), Cursor::from(value)))
            .collect())
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<(), CursorStoreError> {
        let entries: BTreeMap<&str, String> = snapshot
            .iter()
            .map(|(key, cursor)| (key.as_str(), cursor.to_string()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&entries)
            .map_err(|e| CursorStoreError::Codec(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = temp_path(&self.path);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Wrote {} cursors to {}", entries.len(), self.path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("cursors.json"));
    name.push(".tmp");
    path.with_file_name(name)
}

async fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, CursorStoreError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };

    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&contents).map_err(|e| CursorStoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl CursorStore for JsonFileCursorStore {
    async fn load(&self) -> Result<Snapshot, CursorStoreError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), CursorStoreError> {
        let _guard = self.lock.lock().await;
        let mut merged = self.read().await?;
        merged.extend(snapshot.iter().map(|(k, c)| (k.clone(), c.clone())));
        self.write(&merged).await
    }

    async fn upsert(&self, key: &DatasetKey, cursor: &Cursor) -> Result<(), CursorStoreError> {
        let _guard = self.lock.lock().await;
        let mut merged = self.read().await?;
        merged.insert(key.clone(), cursor.clone());
        self.write(&merged).await
    }

    async fn remove(&self, key: &DatasetKey) -> Result<bool, CursorStoreError> {
        let _guard = self.lock.lock().await;
        let mut merged = self.read().await?;
        let removed = merged.remove(key).is_some();
        if removed {
            self.write(&merged).await?;
        }
        Ok(removed)
    }
}
