use crate::error::SourceError;
use async_trait::async_trait;
use model::{
    core::{dataset::Dataset, value::Value},
    records::document::Document,
};

/// Read side of the document store.
///
/// Documents come back with driver identifiers already flattened into
/// [`Value::Identifier`]; field names are returned as stored.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Lists the datasets to mirror. Read fresh on every run.
    async fn list_datasets(&self) -> Result<Vec<Dataset>, SourceError>;

    /// Returns the documents whose identifier is strictly greater than `after`,
    /// ascending by identifier. `None` returns the whole collection.
    async fn fetch_delta(
        &self,
        dataset: &Dataset,
        after: Option<&str>,
    ) -> Result<Vec<Document>, SourceError>;

    /// Reads the dataset-wide "updated at" marker, undecoded.
    async fn read_freshness_marker(&self, dataset: &Dataset) -> Result<Value, SourceError>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
