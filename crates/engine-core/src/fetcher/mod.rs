use crate::error::FetchError;
use connectors::source::DataSource;
use model::{core::dataset::Dataset, pagination::cursor::Cursor, records::document::Document};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

mod freshness;
mod identifier;
pub mod normalize;

pub use freshness::parse_marker;

/// How a dataset's cursor selects new records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Records whose identifier sorts after the cursor.
    #[default]
    Identifier,

    /// The whole collection, whenever the dataset's freshness marker moves
    /// past the cursor.
    Freshness,
}

impl FromStr for CursorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identifier" | "id" => Ok(CursorPolicy::Identifier),
            "freshness" | "timestamp" | "updated_at" => Ok(CursorPolicy::Freshness),
            other => Err(format!("Unknown cursor policy: {other}")),
        }
    }
}

impl fmt::Display for CursorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorPolicy::Identifier => f.write_str("identifier"),
            CursorPolicy::Freshness => f.write_str("freshness"),
        }
    }
}

/// Records to append for one dataset plus the cursor to commit afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub documents: Vec<Document>,
    /// `None` leaves the stored cursor as it is.
    pub next_cursor: Option<Cursor>,
    /// The documents are the full dataset and replace the artifact.
    pub replace: bool,
}

impl Delta {
    pub fn empty() -> Self {
        Delta::default()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Computes deltas against a [`DataSource`] under a single cursor policy.
#[derive(Clone)]
pub struct DeltaFetcher {
    source: Arc<dyn DataSource>,
    policy: CursorPolicy,
}

impl DeltaFetcher {
    pub fn new(source: Arc<dyn DataSource>, policy: CursorPolicy) -> Self {
        DeltaFetcher { source, policy }
    }

    /// Fetches what is new in `dataset` since `cursor`.
    ///
    /// Every returned document is normalized. Any decode problem fails the
    /// whole dataset; nothing is emitted partially.
    pub async fn fetch(
        &self,
        dataset: &Dataset,
        cursor: Option<&Cursor>,
    ) -> Result<Delta, FetchError> {
        match self.policy {
            CursorPolicy::Identifier => identifier::fetch(&*self.source, dataset, cursor).await,
            CursorPolicy::Freshness => freshness::fetch(&*self.source, dataset, cursor).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::error::SourceError;
    use model::core::value::Value;
    use std::sync::Mutex;

    /// Records calls and serves canned answers.
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub documents: Vec<Document>,
        pub marker: Option<Value>,
        pub calls: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl DataSource for StubSource {
        async fn list_datasets(&self) -> Result<Vec<Dataset>, SourceError> {
            Ok(vec![])
        }

        async fn fetch_delta(
            &self,
            _dataset: &Dataset,
            after: Option<&str>,
        ) -> Result<Vec<Document>, SourceError> {
            self.calls.lock().unwrap().push(after.map(str::to_string));
            Ok(self
                .documents
                .iter()
                .filter(|doc| match (after, doc.identity().and_then(Value::as_str)) {
                    (Some(after), Some(id)) => id > after,
                    _ => true,
                })
                .cloned()
                .collect())
        }

        async fn read_freshness_marker(&self, dataset: &Dataset) -> Result<Value, SourceError> {
            self.marker
                .clone()
                .ok_or_else(|| SourceError::NotFound(dataset.key().to_string()))
        }
    }

    pub(crate) fn record(id: &str, fields: &[(&str, &str)]) -> Document {
        let mut doc: Document = fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect();
        doc.insert("_id", Value::Identifier(id.to_string()));
        doc
    }

    #[test]
    fn policy_parses_aliases() {
        assert_eq!("ID".parse::<CursorPolicy>().unwrap(), CursorPolicy::Identifier);
        assert_eq!(
            "updated_at".parse::<CursorPolicy>().unwrap(),
            CursorPolicy::Freshness
        );
        assert!("offset".parse::<CursorPolicy>().is_err());
    }
}
