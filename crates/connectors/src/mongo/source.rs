use crate::{error::SourceError, mongo::convert, source::DataSource};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use model::{
    core::{dataset::Dataset, value::Value},
    records::document::{Document, IDENTITY_FIELD},
};
use mongodb::{
    Client, Collection,
    bson::{self, doc, oid::ObjectId},
};
use serde::Deserialize;
use tracing::{info, warn};

const CATALOG_DATABASE: &str = "datasets";
const CATALOG_COLLECTION: &str = "datasets";
const FRESHNESS_FIELD: &str = "updated_at";

/// One entry of the dataset catalog collection.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    database: String,
    sample_collection: String,
    #[serde(default)]
    hide_id: Option<bool>,
}

impl From<CatalogEntry> for Dataset {
    fn from(entry: CatalogEntry) -> Self {
        let dataset = Dataset::new(entry.database, entry.sample_collection);
        match entry.hide_id {
            Some(hide) => dataset.with_hide_identity(hide),
            None => dataset,
        }
    }
}

/// [`DataSource`] backed by a MongoDB deployment.
#[derive(Clone)]
pub struct MongoDataSource {
    client: Client,
}

impl MongoDataSource {
    pub async fn connect(uri: &str) -> Result<Self, SourceError> {
        info!("Connecting to document store");
        let client = Client::with_uri_str(uri).await?;
        Ok(Self { client })
    }

    fn catalog(&self) -> Collection<bson::Document> {
        self.client
            .database(CATALOG_DATABASE)
            .collection(CATALOG_COLLECTION)
    }

    fn collection(&self, dataset: &Dataset) -> Collection<bson::Document> {
        self.client
            .database(&dataset.namespace)
            .collection(&dataset.collection)
    }
}

#[async_trait]
impl DataSource for MongoDataSource {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, SourceError> {
        let mut cursor = self.catalog().find(doc! {}).await?;
        let mut datasets = Vec::new();

        while let Some(raw) = cursor.try_next().await? {
            match bson::from_document::<CatalogEntry>(raw) {
                Ok(entry) => datasets.push(Dataset::from(entry)),
                Err(e) => warn!("Skipping malformed catalog entry: {e}"),
            }
        }

        info!("Got {} datasets", datasets.len());
        Ok(datasets)
    }

    async fn fetch_delta(
        &self,
        dataset: &Dataset,
        after: Option<&str>,
    ) -> Result<Vec<Document>, SourceError> {
        let filter = match after {
            Some(id) => {
                let oid = ObjectId::parse_str(id).map_err(|e| {
                    SourceError::Decode(format!("malformed identifier cursor '{id}': {e}"))
                })?;
                doc! { IDENTITY_FIELD: { "$gt": oid } }
            }
            None => doc! {},
        };

        let mut cursor = self
            .collection(dataset)
            .find(filter)
            .sort(doc! { IDENTITY_FIELD: 1 })
            .await?;

        let mut documents = Vec::new();
        while let Some(raw) = cursor.try_next().await? {
            documents.push(convert::to_document(raw)?);
        }

        Ok(documents)
    }

    async fn read_freshness_marker(&self, dataset: &Dataset) -> Result<Value, SourceError> {
        let entry = self
            .catalog()
            .find_one(doc! {
                "database": dataset.namespace.as_str(),
                "sample_collection": dataset.collection.as_str(),
            })
            .await?
            .ok_or_else(|| SourceError::NotFound(dataset.key().to_string()))?;

        match entry.get(FRESHNESS_FIELD) {
            Some(marker) => convert::to_value(FRESHNESS_FIELD, marker.clone()),
            None => Err(SourceError::Decode(format!(
                "catalog entry for {} has no '{FRESHNESS_FIELD}' marker",
                dataset.key()
            ))),
        }
    }

    async fn ping(&self) -> Result<(), SourceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}
