use crate::{
    error::FetchError,
    fetcher::{Delta, normalize::normalize},
};
use chrono::{DateTime, SubsecRound, Utc};
use connectors::source::DataSource;
use model::{core::dataset::Dataset, core::value::Value, pagination::cursor::Cursor};
use tracing::debug;

/// Reads a freshness marker as a whole-second UTC timestamp.
pub fn parse_marker(value: &Value) -> Result<DateTime<Utc>, FetchError> {
    match value {
        Value::Timestamp(ts) => Ok(ts.trunc_subsecs(0)),
        Value::String(s) => Cursor::parse_timestamp(s).ok_or_else(|| {
            FetchError::Decode(format!("freshness marker '{s}' is not a timestamp"))
        }),
        other => Err(FetchError::Decode(format!(
            "freshness marker has unsupported value {other:?}"
        ))),
    }
}

pub(super) async fn fetch(
    source: &dyn DataSource,
    dataset: &Dataset,
    cursor: Option<&Cursor>,
) -> Result<Delta, FetchError> {
    let stored = match cursor {
        None => None,
        Some(Cursor::Timestamp(ts)) => Some(*ts),
        Some(other) => {
            return Err(FetchError::CursorMismatch {
                expected: "timestamp",
                found: other.to_string(),
            });
        }
    };

    let marker = parse_marker(&source.read_freshness_marker(dataset).await?)?;

    if stored.is_some_and(|stored| marker <= stored) {
        debug!("Freshness marker {marker} not after the stored cursor");
        return Ok(Delta::empty());
    }

    let documents = normalize(source.fetch_delta(dataset, None).await?)?;
    debug!("Marker moved to {marker}, refetched {} records", documents.len());

    Ok(Delta {
        documents,
        next_cursor: Some(Cursor::timestamp(marker)),
        replace: true,
    })
}
