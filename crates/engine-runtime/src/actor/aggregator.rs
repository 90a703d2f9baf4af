use crate::{
    actor::{Actor, ActorContext, ActorRef, messages::AggregatorMsg},
    error::{ActorError, CommitError},
};
use async_trait::async_trait;
use engine_core::state::{CursorStore, Snapshot};
use model::{core::identifiers::DatasetKey, pagination::cursor::Cursor};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Single owner of the run's cursor snapshot.
///
/// Units never touch the store directly; each commit is persisted with a
/// per-key upsert before it is acknowledged, so concurrent commits for
/// different datasets cannot overwrite each other.
pub struct CursorAggregator {
    store: Arc<dyn CursorStore>,
    snapshot: Snapshot,
    commits: usize,
}

impl CursorAggregator {
    pub fn new(store: Arc<dyn CursorStore>, snapshot: Snapshot) -> Self {
        CursorAggregator {
            store,
            snapshot,
            commits: 0,
        }
    }
}

#[async_trait]
impl Actor<AggregatorMsg> for CursorAggregator {
    async fn on_start(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        info!(actor = %ctx.name(), "Tracking {} cursors", self.snapshot.len());
        Ok(())
    }

    async fn handle(&mut self, msg: AggregatorMsg, _ctx: &ActorContext) -> Result<(), ActorError> {
        match msg {
            AggregatorMsg::Commit { key, cursor, ack } => {
                let result = match self.store.upsert(&key, &cursor).await {
                    Ok(()) => {
                        info!(dataset = %key, cursor = %cursor, "Cursor committed");
                        self.snapshot.insert(key, cursor);
                        self.commits += 1;
                        Ok(())
                    }
                    Err(e) => {
                        error!(dataset = %key, "Failed to persist cursor: {e}");
                        Err(CommitError::Store(e))
                    }
                };

                if ack.send(result).is_err() {
                    warn!("Commit acknowledged after the unit went away");
                }
            }
            AggregatorMsg::Snapshot { reply } => {
                let _ = reply.send(self.snapshot.clone());
            }
        }
        Ok(())
    }

    async fn on_stop(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        info!(actor = %ctx.name(), "Stopped after {} commits", self.commits);
        Ok(())
    }
}

impl ActorRef<AggregatorMsg> {
    /// Resolves once the cursor is durable.
    pub async fn commit(&self, key: DatasetKey, cursor: Cursor) -> Result<(), CommitError> {
        self.request(|ack| AggregatorMsg::Commit { key, cursor, ack })
            .await?
    }

    pub async fn snapshot(&self) -> Result<Snapshot, ActorError> {
        self.request(|reply| AggregatorMsg::Snapshot { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_actor;
    use engine_core::state::{JsonFileCursorStore, SledCursorStore};
    use tempfile::tempdir;

    #[tokio::test]
    async fn concurrent_commits_merge_by_key() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn CursorStore> =
            Arc::new(JsonFileCursorStore::new(dir.path().join("snapshot.json")));

        let mut initial = Snapshot::new();
        initial.insert(DatasetKey::from("old.keep"), Cursor::identifier("9"));
        store.save(&initial).await.unwrap();

        let (aggregator, handle) = spawn_actor(
            "cursor-aggregator",
            8,
            CursorAggregator::new(store.clone(), initial),
        );

        let mut tasks = Vec::new();
        for i in 0..10 {
            let aggregator = aggregator.clone();
            tasks.push(tokio::spawn(async move {
                let key = DatasetKey::from(format!("db.c{i}"));
                aggregator.commit(key, Cursor::identifier(format!("{i}"))).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(aggregator.snapshot().await.unwrap().len(), 11);
        drop(aggregator);
        handle.await.unwrap();

        let persisted = store.load().await.unwrap();
        assert_eq!(persisted.len(), 11);
        assert_eq!(
            persisted[&DatasetKey::from("old.keep")],
            Cursor::identifier("9")
        );
    }

    #[tokio::test]
    async fn commit_after_stop_is_reported() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn CursorStore> = Arc::new(SledCursorStore::open(dir.path()).unwrap());
        let (aggregator, handle) = spawn_actor(
            "cursor-aggregator",
            1,
            CursorAggregator::new(store, Snapshot::new()),
        );

        handle.abort();
        let _ = handle.await;

        let err = aggregator
            .commit(DatasetKey::from("a.b"), Cursor::identifier("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::Aggregator(_)));
    }
}
