use crate::error::SourceError;
use chrono::DateTime;
use model::{
    core::value::{Number, Value},
    records::document::Document,
};
use mongodb::bson::{self, Bson};

pub(crate) fn to_document(raw: bson::Document) -> Result<Document, SourceError> {
    raw.into_iter()
        .map(|(key, value)| {
            let value = to_value(&key, value)?;
            Ok((key, value))
        })
        .collect()
}

/// Maps a BSON value onto the closed [`Value`] set.
///
/// Nested documents, arrays, binaries and decimals have no tabular form of their
/// own and are carried as their relaxed extended-JSON text.
pub(crate) fn to_value(field: &str, value: Bson) -> Result<Value, SourceError> {
    let value = match value {
        Bson::String(s) | Bson::Symbol(s) => Value::String(s),
        Bson::Int32(v) => Value::Number(Number::Int(i64::from(v))),
        Bson::Int64(v) => Value::Number(Number::Int(v)),
        Bson::Double(v) => Value::Number(Number::Float(v)),
        Bson::Boolean(v) => Value::Bool(v),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::ObjectId(oid) => Value::Identifier(oid.to_hex()),
        Bson::DateTime(dt) => {
            let millis = dt.timestamp_millis();
            let ts = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                SourceError::Decode(format!("field '{field}' holds out-of-range date {millis}"))
            })?;
            Value::Timestamp(ts)
        }
        Bson::Timestamp(ts) => {
            let ts = DateTime::from_timestamp(i64::from(ts.time), 0).ok_or_else(|| {
                SourceError::Decode(format!("field '{field}' holds out-of-range timestamp"))
            })?;
            Value::Timestamp(ts)
        }
        nested @ (Bson::Document(_) | Bson::Array(_) | Bson::Binary(_) | Bson::Decimal128(_)) => {
            Value::String(nested.into_relaxed_extjson().to_string())
        }
        other => {
            return Err(SourceError::Decode(format!(
                "field '{field}' has unsupported BSON type {:?}",
                other.element_type()
            )));
        }
    };
    Ok(value)
}
