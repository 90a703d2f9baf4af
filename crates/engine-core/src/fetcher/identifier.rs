use crate::{
    error::FetchError,
    fetcher::{Delta, normalize::normalize},
};
use connectors::source::DataSource;
use model::{
    core::{dataset::Dataset, value::Value},
    pagination::cursor::Cursor,
};
use tracing::debug;

pub(super) async fn fetch(
    source: &dyn DataSource,
    dataset: &Dataset,
    cursor: Option<&Cursor>,
) -> Result<Delta, FetchError> {
    let after = match cursor {
        None => None,
        Some(Cursor::Identifier(id)) if id.is_empty() => None,
        Some(Cursor::Identifier(id)) => Some(id.as_str()),
        Some(other) => {
            return Err(FetchError::CursorMismatch {
                expected: "identifier",
                found: other.to_string(),
            });
        }
    };

    let documents = normalize(source.fetch_delta(dataset, after).await?)?;

    // Only object identifiers can be resumed from; reject the batch before
    // anything reaches the artifact.
    let mut next_cursor = None;
    for doc in &documents {
        match doc.identity() {
            Some(Value::Identifier(id)) => next_cursor = Some(Cursor::identifier(id.clone())),
            Some(other) => {
                return Err(FetchError::Decode(format!(
                    "{} has a non-ObjectId identity {other:?}; use the freshness policy",
                    dataset.key()
                )));
            }
            None => {
                return Err(FetchError::Decode(format!(
                    "a record of {} has no identity",
                    dataset.key()
                )));
            }
        }
    }

    debug!(
        "Fetched {} records after {}",
        documents.len(),
        after.unwrap_or("<start>")
    );

    Ok(Delta {
        documents,
        next_cursor,
        replace: false,
    })
}

#[cfg(test)]
mod tests {
    use crate::fetcher::{
        CursorPolicy, DeltaFetcher,
        tests::{StubSource, record},
    };
    use crate::error::FetchError;
    use chrono::Utc;
    use model::{
        core::{dataset::Dataset, value::Value},
        pagination::cursor::Cursor,
    };
    use std::sync::Arc;

    fn fixture() -> Arc<StubSource> {
        Arc::new(StubSource {
            documents: vec![
                record("000000000000000000000001", &[("Name", "a")]),
                record("000000000000000000000002", &[("Name", "b")]),
                record("000000000000000000000003", &[("Name", "c")]),
            ],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn empty_cursor_reads_from_the_beginning() {
        let source = fixture();
        let fetcher = DeltaFetcher::new(source.clone(), CursorPolicy::Identifier);

        let delta = fetcher.fetch(&Dataset::new("a", "b"), None).await.unwrap();
        assert_eq!(delta.len(), 3);
        assert!(!delta.replace);
        assert_eq!(
            delta.next_cursor,
            Some(Cursor::identifier("000000000000000000000003"))
        );
        assert!(delta.documents[0].get("name").is_some());
        assert_eq!(source.calls.lock().unwrap()[0], None);
    }

    #[tokio::test]
    async fn caught_up_cursor_yields_empty_delta() {
        let fetcher = DeltaFetcher::new(fixture(), CursorPolicy::Identifier);
        let cursor = Cursor::identifier("000000000000000000000003");

        let delta = fetcher
            .fetch(&Dataset::new("a", "b"), Some(&cursor))
            .await
            .unwrap();
        assert!(delta.is_empty());
        assert_eq!(delta.next_cursor, None);
    }

    #[tokio::test]
    async fn timestamp_cursor_is_rejected() {
        let fetcher = DeltaFetcher::new(fixture(), CursorPolicy::Identifier);
        let cursor = Cursor::timestamp(Utc::now());

        let err = fetcher
            .fetch(&Dataset::new("a", "b"), Some(&cursor))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::CursorMismatch { .. }));
    }

    #[tokio::test]
    async fn string_identities_are_rejected_before_any_cursor() {
        let mut doc = record("", &[("Name", "a")]);
        doc.insert("_id", Value::from("order-17"));
        let fetcher = DeltaFetcher::new(
            Arc::new(StubSource {
                documents: vec![doc],
                ..Default::default()
            }),
            CursorPolicy::Identifier,
        );

        let err = fetcher.fetch(&Dataset::new("a", "b"), None).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
