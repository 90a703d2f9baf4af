//! In-memory collaborators for driving the engine without MongoDB or GCS.

use async_trait::async_trait;
use connectors::{
    error::SourceError,
    source::DataSource,
    storage::{BlobSink, PublishError},
};
use engine_core::{
    error::CursorStoreError,
    state::{CursorStore, Snapshot},
};
use model::{
    core::{dataset::Dataset, identifiers::DatasetKey, value::Value},
    pagination::cursor::Cursor,
    records::document::Document,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Failure injected into every source call for one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Connectivity,
    Decode,
    /// Sleep before answering; used to trip deadlines.
    Hang(Duration),
}

struct Collection {
    dataset: Dataset,
    documents: Vec<Document>,
    marker: Value,
}

/// Document store double. Identifiers compare as strings, so tests use
/// fixed-width hex ids (see [`crate::oid`]).
#[derive(Default)]
pub struct FakeSource {
    collections: Mutex<BTreeMap<DatasetKey, Collection>>,
    extra_catalog: Mutex<Vec<Dataset>>,
    faults: Mutex<HashMap<DatasetKey, Fault>>,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dataset(&self, dataset: Dataset) -> DatasetKey {
        let key = dataset.key();
        self.collections.lock().unwrap().insert(
            key.clone(),
            Collection {
                dataset,
                documents: Vec::new(),
                marker: Value::Null,
            },
        );
        key
    }

    /// Lists `dataset` a second time in the catalog.
    pub fn add_catalog_entry(&self, dataset: Dataset) {
        self.extra_catalog.lock().unwrap().push(dataset);
    }

    pub fn insert(&self, key: &DatasetKey, documents: impl IntoIterator<Item = Document>) {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.get_mut(key).expect("unknown dataset");
        collection.documents.extend(documents);
    }

    /// Swaps the whole collection, as an upstream full refresh would.
    pub fn replace(&self, key: &DatasetKey, documents: impl IntoIterator<Item = Document>) {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.get_mut(key).expect("unknown dataset");
        collection.documents = documents.into_iter().collect();
    }

    pub fn set_marker(&self, key: &DatasetKey, marker: Value) {
        let mut collections = self.collections.lock().unwrap();
        collections.get_mut(key).expect("unknown dataset").marker = marker;
    }

    pub fn inject(&self, key: &DatasetKey, fault: Fault) {
        self.faults.lock().unwrap().insert(key.clone(), fault);
    }

    pub fn heal(&self, key: &DatasetKey) {
        self.faults.lock().unwrap().remove(key);
    }

    /// Number of `fetch_delta` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn check_fault(&self, key: &DatasetKey) -> Result<(), SourceError> {
        let fault = self.faults.lock().unwrap().get(key).copied();
        match fault {
            None => Ok(()),
            Some(Fault::Connectivity) => Err(SourceError::Connectivity(format!(
                "{key}: connection reset by peer"
            ))),
            Some(Fault::Decode) => Err(SourceError::Decode(format!(
                "{key}: invalid BSON in document"
            ))),
            Some(Fault::Hang(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl DataSource for FakeSource {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, SourceError> {
        let mut datasets: Vec<Dataset> = self
            .collections
            .lock()
            .unwrap()
            .values()
            .map(|c| c.dataset.clone())
            .collect();
        datasets.extend(self.extra_catalog.lock().unwrap().iter().cloned());
        Ok(datasets)
    }

    async fn fetch_delta(
        &self,
        dataset: &Dataset,
        after: Option<&str>,
    ) -> Result<Vec<Document>, SourceError> {
        let key = dataset.key();
        self.check_fault(&key).await?;
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let collections = self.collections.lock().unwrap();
        let collection = collections
            .get(&key)
            .ok_or_else(|| SourceError::NotFound(key.to_string()))?;

        let mut documents: Vec<Document> = collection
            .documents
            .iter()
            .filter(|doc| match (after, doc.identity().and_then(Value::as_str)) {
                (Some(after), Some(id)) => id > after,
                _ => true,
            })
            .cloned()
            .collect();
        documents.sort_by(|a, b| {
            let a = a.identity().and_then(Value::as_str);
            let b = b.identity().and_then(Value::as_str);
            a.cmp(&b)
        });
        Ok(documents)
    }

    async fn read_freshness_marker(&self, dataset: &Dataset) -> Result<Value, SourceError> {
        let key = dataset.key();
        self.check_fault(&key).await?;

        let collections = self.collections.lock().unwrap();
        collections
            .get(&key)
            .map(|c| c.marker.clone())
            .ok_or_else(|| SourceError::NotFound(key.to_string()))
    }
}

/// Wraps a real sink and fails uploads on demand.
pub struct FlakySink {
    inner: Arc<dyn BlobSink>,
    transient: AtomicUsize,
    broken: Mutex<HashSet<String>>,
    uploads: AtomicUsize,
}

impl FlakySink {
    pub fn new(inner: Arc<dyn BlobSink>) -> Self {
        FlakySink {
            inner,
            transient: AtomicUsize::new(0),
            broken: Mutex::new(HashSet::new()),
            uploads: AtomicUsize::new(0),
        }
    }

    /// The next `n` uploads fail with a retryable transport error.
    pub fn fail_next_uploads(&self, n: usize) {
        self.transient.store(n, Ordering::SeqCst);
    }

    /// Every upload of `name` is rejected with a non-retryable error.
    pub fn break_artifact(&self, name: impl Into<String>) {
        self.broken.lock().unwrap().insert(name.into());
    }

    pub fn repair_artifact(&self, name: &str) {
        self.broken.lock().unwrap().remove(name);
    }

    /// Successful uploads so far.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobSink for FlakySink {
    async fn exists(&self, name: &str) -> Result<Option<u64>, PublishError> {
        self.inner.exists(name).await
    }

    async fn download(&self, name: &str, dest: &Path) -> Result<u64, PublishError> {
        self.inner.download(name, dest).await
    }

    async fn upload(&self, local_path: &Path) -> Result<String, PublishError> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.broken.lock().unwrap().contains(&name) {
            return Err(PublishError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("bucket rejected write of {name}"),
            )));
        }

        let transient = self
            .transient
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if transient.is_ok() {
            return Err(PublishError::Connectivity(object_store::Error::Generic {
                store: "fake",
                source: "connection timed out".into(),
            }));
        }

        let url = self.inner.upload(local_path).await?;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(url)
    }
}

/// Cursor store that can lose commits, standing in for a crash between
/// publishing an artifact and persisting its cursor.
pub struct CrashingStore {
    inner: Arc<dyn CursorStore>,
    crash: AtomicBool,
}

impl CrashingStore {
    pub fn new(inner: Arc<dyn CursorStore>) -> Self {
        CrashingStore {
            inner,
            crash: AtomicBool::new(false),
        }
    }

    pub fn crash_on_commit(&self, crash: bool) {
        self.crash.store(crash, Ordering::SeqCst);
    }
}

#[async_trait]
impl CursorStore for CrashingStore {
    async fn load(&self) -> Result<Snapshot, CursorStoreError> {
        self.inner.load().await
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), CursorStoreError> {
        self.inner.save(snapshot).await
    }

    async fn upsert(&self, key: &DatasetKey, cursor: &Cursor) -> Result<(), CursorStoreError> {
        if self.crash.load(Ordering::SeqCst) {
            return Err(CursorStoreError::Io(io::Error::other(
                "process killed before cursor was written",
            )));
        }
        self.inner.upsert(key, cursor).await
    }

    async fn remove(&self, key: &DatasetKey) -> Result<bool, CursorStoreError> {
        self.inner.remove(key).await
    }
}
