use crate::{
    actor::{ActorRef, messages::AggregatorMsg},
    error::{Stage, SyncError},
    execution::artifact::Staging,
    report::{UnitReport, UnitState},
    settings::Timeouts,
};
use connectors::{
    file::csv::{CsvAppender, HeaderPolicy},
    storage::{BlobSink, PublishError},
};
use engine_core::{
    error::FetchError,
    fetcher::{Delta, DeltaFetcher},
    metrics::SyncMetrics,
    retry::{RetryDisposition, RetryPolicy},
};
use model::{
    core::{dataset::Dataset, identifiers::DatasetKey},
    pagination::cursor::Cursor,
    records::document::Document,
};
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};

/// Collaborators shared by every unit of a run.
pub struct UnitContext {
    pub fetcher: DeltaFetcher,
    pub sink: Arc<dyn BlobSink>,
    pub staging: Staging,
    pub header_policy: HeaderPolicy,
    pub timeouts: Timeouts,
    pub retry: RetryPolicy,
    pub aggregator: ActorRef<AggregatorMsg>,
    pub metrics: SyncMetrics,
    pub cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct Outcome {
    rows: usize,
    url: Option<String>,
    cursor: Option<Cursor>,
}

/// Drives one dataset through fetch, append, publish and commit.
///
/// A unit never advances its cursor unless the artifact holding the delta
/// has been published and the aggregator has acknowledged the commit.
pub struct SyncUnit {
    dataset: Dataset,
    key: DatasetKey,
    cursor: Option<Cursor>,
    state: UnitState,
    ctx: Arc<UnitContext>,
}

impl SyncUnit {
    pub fn new(dataset: Dataset, cursor: Option<Cursor>, ctx: Arc<UnitContext>) -> Self {
        let key = dataset.key();
        SyncUnit {
            dataset,
            key,
            cursor,
            state: UnitState::Pending,
            ctx,
        }
    }

    pub async fn run(mut self) -> UnitReport {
        let span = info_span!("sync_unit", dataset = %self.key);

        async move {
            let started = Instant::now();
            let result = self.drive().await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(outcome) => {
                    self.transition(UnitState::Committed);
                    if outcome.rows == 0 {
                        self.ctx.metrics.increment_unchanged();
                    } else {
                        self.ctx.metrics.increment_committed();
                        self.ctx.metrics.increment_rows(outcome.rows as u64);
                    }

                    UnitReport {
                        dataset: self.key.clone(),
                        state: self.state,
                        rows_appended: outcome.rows,
                        cursor: outcome.cursor.map(|c| c.to_string()),
                        url: outcome.url,
                        error_kind: None,
                        error: None,
                        elapsed_ms,
                    }
                }
                Err(err) => {
                    self.transition(UnitState::Failed);
                    self.ctx.metrics.increment_failures();
                    error!("Sync failed: {err}");
                    UnitReport::failed(&err, elapsed_ms)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self) -> Result<Outcome, SyncError> {
        self.transition(UnitState::Fetching);
        let delta = self.fetch().await?;

        if delta.is_empty() {
            info!("No new records");
            return Ok(Outcome::default());
        }

        self.transition(UnitState::AppendingPublishing);
        let Delta {
            documents,
            next_cursor,
            replace,
        } = delta;

        let (rows, url) = match self.append_and_publish(documents, replace).await {
            Ok(published) => published,
            Err(err) => {
                self.ctx.staging.discard(&self.dataset).await;
                return Err(err);
            }
        };

        // The artifact is public now; commit even if shutdown was requested.
        if let Some(cursor) = &next_cursor {
            self.ctx
                .aggregator
                .commit(self.key.clone(), cursor.clone())
                .await
                .map_err(|e| SyncError::from_commit(self.key.clone(), e))?;
        }

        info!("Appended {rows} rows, published {url}");
        Ok(Outcome {
            rows,
            url: Some(url),
            cursor: next_cursor,
        })
    }

    async fn fetch(&self) -> Result<Delta, SyncError> {
        let ctx = &self.ctx;
        let dataset = &self.dataset;
        let cursor = self.cursor.as_ref();

        self.bounded(Stage::Fetch, ctx.timeouts.fetch, async {
            ctx.retry
                .run(
                    || ctx.fetcher.fetch(dataset, cursor),
                    |e: &FetchError| classify(&ctx.metrics, e.is_retryable()),
                )
                .await
                .map_err(|e| SyncError::from_fetch(self.key.clone(), e.into_inner()))
        })
        .await
    }

    async fn append_and_publish(
        &self,
        documents: Vec<Document>,
        replace: bool,
    ) -> Result<(usize, String), SyncError> {
        let ctx = &self.ctx;
        let path = ctx.staging.path_for(&self.dataset);

        let mode = self
            .bounded(Stage::Publish, ctx.timeouts.publish, async {
                ctx.retry
                    .run(
                        || ctx.staging.prepare(&self.dataset, &*ctx.sink, replace),
                        |e: &PublishError| classify(&ctx.metrics, e.is_retryable()),
                    )
                    .await
                    .map_err(|e| SyncError::from_publish(self.key.clone(), e.into_inner()))
            })
            .await?;

        let appender =
            CsvAppender::new(ctx.header_policy).hide_identity(self.dataset.hide_identity);
        let blocking_path = path.clone();
        let key = self.key.clone();
        let summary = self
            .bounded(Stage::Append, ctx.timeouts.append, async move {
                tokio::task::spawn_blocking(move || {
                    appender.append(&blocking_path, &documents, mode.is_new())
                })
                .await
                .map_err(|e| SyncError::Join {
                    key: key.clone(),
                    message: e.to_string(),
                })?
                .map_err(|e| SyncError::from_artifact(key, e))
            })
            .await?;
        debug!(
            "Artifact has {} columns, {} rows written",
            summary.header.len(),
            summary.rows_written
        );

        let url = self
            .bounded(Stage::Publish, ctx.timeouts.publish, async {
                ctx.retry
                    .run(
                        || ctx.sink.upload(&path),
                        |e: &PublishError| classify(&ctx.metrics, e.is_retryable()),
                    )
                    .await
                    .map_err(|e| SyncError::from_publish(self.key.clone(), e.into_inner()))
            })
            .await?;

        if let Ok(meta) = tokio::fs::metadata(&path).await {
            ctx.metrics.increment_bytes(meta.len());
        }

        Ok((summary.rows_written, url))
    }

    /// Runs one step under its deadline, giving up early on cancellation.
    async fn bounded<T>(
        &self,
        stage: Stage,
        limit: Duration,
        step: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        let cancel = &self.ctx.cancel;
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled {
                key: self.key.clone(),
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled {
                key: self.key.clone(),
            }),
            result = tokio::time::timeout(limit, step) => result.unwrap_or_else(|_| {
                Err(SyncError::Timeout {
                    key: self.key.clone(),
                    stage,
                    limit,
                })
            }),
        }
    }

    fn transition(&mut self, next: UnitState) {
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }
}

fn classify(metrics: &SyncMetrics, retryable: bool) -> RetryDisposition {
    if retryable {
        metrics.increment_retries(1);
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}
