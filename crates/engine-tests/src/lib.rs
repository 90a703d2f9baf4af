#![allow(dead_code)]

use connectors::storage::{BlobSink, ObjectStorePublisher};
use engine_core::{
    retry::RetryPolicy,
    state::{CursorStore, SledCursorStore},
};
use engine_runtime::{execution::SyncEngine, report::RunReport, settings::RunOptions};
use fakes::{CrashingStore, FakeSource, FlakySink};
use model::{
    core::{dataset::Dataset, identifiers::DatasetKey, value::Value},
    pagination::cursor::Cursor,
    records::document::Document,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub mod fakes;
pub mod runtime;
pub mod utils;

/// Fixed-width hex identifier, so string order matches numeric order.
pub fn oid(n: u64) -> String {
    format!("{n:024x}")
}

/// Source document with identifier `oid(n)` and string fields.
pub fn doc(n: u64, fields: &[(&str, &str)]) -> Document {
    let mut doc: Document = fields
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect();
    doc.insert("_id", Value::Identifier(oid(n)));
    doc
}

/// One engine wired to in-memory fakes, with its state under a temp dir.
///
/// The same harness can run several times; the cursor store, the staging
/// area and the published artifacts survive between runs like they would
/// between two invocations of the binary.
pub struct Harness {
    pub dir: TempDir,
    pub source: Arc<FakeSource>,
    pub publisher: Arc<ObjectStorePublisher>,
    pub sink: Arc<FlakySink>,
    pub store: Arc<CrashingStore>,
    pub options: RunOptions,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let store: Arc<dyn CursorStore> =
            Arc::new(SledCursorStore::open(dir.path().join("state")).expect("open sled"));
        Self::with_store(dir, store).await
    }

    pub async fn with_store(dir: TempDir, store: Arc<dyn CursorStore>) -> Self {
        let publisher = Arc::new(
            ObjectStorePublisher::from_url("memory://", None, None)
                .await
                .expect("memory publisher"),
        );
        let sink = Arc::new(FlakySink::new(publisher.clone()));

        let options = RunOptions {
            staging_dir: dir.path().join("staging"),
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
            ..RunOptions::default()
        };

        Harness {
            source: Arc::new(FakeSource::new()),
            publisher,
            sink,
            store: Arc::new(CrashingStore::new(store)),
            options,
            dir,
        }
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(
            self.source.clone(),
            self.sink.clone(),
            self.store.clone(),
            self.options.clone(),
        )
    }

    pub async fn run(&self) -> RunReport {
        self.run_with(CancellationToken::new()).await
    }

    pub async fn run_with(&self, cancel: CancellationToken) -> RunReport {
        self.engine().run(cancel).await.expect("sync run")
    }

    pub async fn cursor(&self, key: &DatasetKey) -> Option<Cursor> {
        self.store.get(key).await.expect("read cursor")
    }

    pub fn staged_path(&self, dataset: &Dataset) -> PathBuf {
        self.options.staging_dir.join(dataset.artifact_name())
    }

    /// Downloads the published artifact of `dataset`; `None` if never published.
    pub async fn published(&self, dataset: &Dataset) -> Option<String> {
        let name = dataset.artifact_name();
        self.publisher.exists(&name).await.expect("head")?;

        let dest = self.dir.path().join("downloads").join(&name);
        self.publisher
            .download(&name, &dest)
            .await
            .expect("download artifact");
        Some(tokio::fs::read_to_string(&dest).await.expect("read artifact"))
    }
}
