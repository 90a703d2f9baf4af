use crate::{
    error::RuntimeError,
    settings::{StateBackend, StoreSettings, SyncSettings},
};
use connectors::{
    mongo::MongoDataSource,
    source::DataSource,
    storage::{BlobSink, ObjectStorePublisher},
};
use engine_core::state::{CursorStore, JsonFileCursorStore, SledCursorStore};
use std::sync::Arc;
use tracing::info;

pub async fn create_source(db_uri: &str) -> Result<Arc<dyn DataSource>, RuntimeError> {
    let source = MongoDataSource::connect(db_uri).await?;
    Ok(Arc::new(source))
}

pub async fn create_sink(settings: &SyncSettings) -> Result<Arc<dyn BlobSink>, RuntimeError> {
    let publisher = ObjectStorePublisher::from_url(
        &settings.storage_url,
        settings.storage_prefix.as_deref(),
        settings.public_url(),
    )
    .await?;
    Ok(Arc::new(publisher))
}

pub fn open_cursor_store(settings: &StoreSettings) -> Result<Arc<dyn CursorStore>, RuntimeError> {
    let path = settings.resolved_path()?;
    info!(
        "Opening {} cursor store at {}",
        settings.backend,
        path.display()
    );

    let store: Arc<dyn CursorStore> = match settings.backend {
        StateBackend::Sled => Arc::new(SledCursorStore::open(&path)?),
        StateBackend::Json => Arc::new(JsonFileCursorStore::new(path)),
    };
    Ok(store)
}
