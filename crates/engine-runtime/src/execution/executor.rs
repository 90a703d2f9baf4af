use crate::{
    actor::{CursorAggregator, spawn_actor},
    error::{RuntimeError, SyncError},
    execution::{
        artifact::Staging,
        unit::{SyncUnit, UnitContext},
    },
    report::{RunReport, UnitReport},
    settings::RunOptions,
};
use connectors::{error::SourceError, source::DataSource, storage::BlobSink};
use engine_core::{
    fetcher::DeltaFetcher,
    metrics::SyncMetrics,
    retry::RetryDisposition,
    state::CursorStore,
};
use model::core::identifiers::{DatasetKey, RunId};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

const AGGREGATOR_MAILBOX: usize = 64;

/// Runs one synchronization pass over every dataset in the catalog.
pub struct SyncEngine {
    source: Arc<dyn DataSource>,
    sink: Arc<dyn BlobSink>,
    store: Arc<dyn CursorStore>,
    options: RunOptions,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn DataSource>,
        sink: Arc<dyn BlobSink>,
        store: Arc<dyn CursorStore>,
        options: RunOptions,
    ) -> Self {
        SyncEngine {
            source,
            sink,
            store,
            options,
        }
    }

    /// Syncs all datasets concurrently and waits for every one of them.
    ///
    /// Per-dataset failures are recorded in the report; only catalog, store
    /// or staging problems abort the run as a whole.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, RuntimeError> {
        let run_id = RunId::new(Uuid::new_v4().to_string());
        let span = info_span!("sync_run", run_id = %run_id);
        self.execute(run_id, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: RunId,
        cancel: CancellationToken,
    ) -> Result<RunReport, RuntimeError> {
        let started = Instant::now();
        info!("Starting sync run");

        let datasets = self.list_datasets().await?;
        let snapshot = self.store.load().await?;
        tokio::fs::create_dir_all(&self.options.staging_dir)
            .await
            .map_err(|e| {
                RuntimeError::Initialization(format!(
                    "cannot create staging dir {}: {e}",
                    self.options.staging_dir.display()
                ))
            })?;

        let metrics = SyncMetrics::new();
        let (aggregator, aggregator_handle) = spawn_actor(
            "cursor-aggregator",
            AGGREGATOR_MAILBOX,
            CursorAggregator::new(self.store.clone(), snapshot.clone()),
        );

        let ctx = Arc::new(UnitContext {
            fetcher: DeltaFetcher::new(self.source.clone(), self.options.cursor_policy),
            sink: self.sink.clone(),
            staging: Staging::new(&self.options.staging_dir),
            header_policy: self.options.header_policy,
            timeouts: self.options.timeouts,
            retry: self.options.retry.clone(),
            aggregator,
            metrics: metrics.clone(),
            cancel: cancel.clone(),
        });

        let limiter = (self.options.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.options.max_concurrency)));

        let mut seen = HashSet::new();
        let mut artifacts: HashMap<String, DatasetKey> = HashMap::new();
        let mut units = Vec::with_capacity(datasets.len());
        let mut handles: Vec<(DatasetKey, JoinHandle<UnitReport>)> =
            Vec::with_capacity(datasets.len());

        for dataset in datasets {
            let key = dataset.key();
            if !seen.insert(key.clone()) {
                warn!(dataset = %key, "Duplicate catalog entry, skipping");
                continue;
            }

            // `a-b.c` and `a.b-c` flatten to the same artifact name.
            let artifact = dataset.artifact_name();
            if let Some(owner) = artifacts.get(&artifact) {
                let err = SyncError::Conflict {
                    key,
                    artifact,
                    owner: owner.clone(),
                };
                error!("Sync failed: {err}");
                metrics.increment_failures();
                units.push(UnitReport::failed(&err, 0));
                continue;
            }
            artifacts.insert(artifact, key.clone());

            let cursor = snapshot.get(&key).cloned();
            let unit = SyncUnit::new(dataset, cursor, ctx.clone());
            let limiter = limiter.clone();

            let handle = tokio::spawn(
                async move {
                    let _permit = match limiter {
                        Some(limiter) => limiter.acquire_owned().await.ok(),
                        None => None,
                    };
                    unit.run().await
                }
                .in_current_span(),
            );
            handles.push((key, handle));
        }

        info!("Launched {} sync units", handles.len());

        for (key, handle) in handles {
            match handle.await {
                Ok(report) => units.push(report),
                Err(e) => {
                    error!(dataset = %key, "Sync unit panicked: {e}");
                    metrics.increment_failures();
                    let err = SyncError::Join {
                        key,
                        message: e.to_string(),
                    };
                    units.push(UnitReport::failed(&err, 0));
                }
            }
        }

        // Last mailbox handle goes away here, letting the aggregator drain and stop.
        drop(ctx);
        if let Err(e) = aggregator_handle.await {
            error!("Cursor aggregator terminated abnormally: {e}");
        }

        let report = RunReport {
            run_id: run_id.to_string(),
            units,
            metrics: metrics.snapshot(),
            cancelled: cancel.is_cancelled(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Sync run finished: {} committed, {} unchanged, {} failed in {:.2}s",
            report.metrics.datasets_committed,
            report.metrics.datasets_unchanged,
            report.metrics.datasets_failed,
            started.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    async fn list_datasets(&self) -> Result<Vec<model::core::dataset::Dataset>, RuntimeError> {
        let datasets = self
            .options
            .retry
            .run(
                || self.source.list_datasets(),
                |e: &SourceError| {
                    if e.is_connectivity() {
                        RetryDisposition::Retry
                    } else {
                        RetryDisposition::Stop
                    }
                },
            )
            .await
            .map_err(|e| RuntimeError::Source(e.into_inner()))?;

        info!("Catalog lists {} datasets", datasets.len());
        Ok(datasets)
    }
}
