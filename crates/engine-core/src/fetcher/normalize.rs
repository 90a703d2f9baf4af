use crate::error::FetchError;
use model::{
    core::value::Value,
    records::document::{Document, IDENTITY_FIELD},
};

/// Lowercases field names and checks the identity field.
///
/// Two fields that fold to the same lowercase name are a decode error, as is
/// an identity that is neither an identifier nor a string. The identity keeps
/// its kind: a string `_id` stays a string.
pub fn normalize_document(doc: Document) -> Result<Document, FetchError> {
    let mut normalized = Document::new();

    for (key, value) in doc {
        let lower = key.to_lowercase();
        let value = if lower == IDENTITY_FIELD {
            check_identity(value)?
        } else {
            value
        };

        if normalized.insert(lower.clone(), value).is_some() {
            return Err(FetchError::Decode(format!(
                "field '{key}' collides with another field named '{lower}'"
            )));
        }
    }

    Ok(normalized)
}

pub fn normalize(documents: Vec<Document>) -> Result<Vec<Document>, FetchError> {
    documents.into_iter().map(normalize_document).collect()
}

fn check_identity(value: Value) -> Result<Value, FetchError> {
    match value {
        id @ (Value::Identifier(_) | Value::String(_)) => Ok(id),
        other => Err(FetchError::Decode(format!(
            "identity field holds a non-identifier value: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_keys() {
        let doc: Document = [
            ("Name".to_string(), Value::from("x")),
            ("CITY".to_string(), Value::from("y")),
        ]
        .into_iter()
        .collect();

        let doc = normalize_document(doc).unwrap();
        let keys: Vec<_> = doc.keys().cloned().collect();
        assert_eq!(keys, ["city", "name"]);
    }

    #[test]
    fn case_fold_collision_is_rejected() {
        let doc: Document = [
            ("name".to_string(), Value::from("x")),
            ("Name".to_string(), Value::from("y")),
        ]
        .into_iter()
        .collect();

        assert!(matches!(
            normalize_document(doc),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn string_identity_keeps_its_kind() {
        let doc: Document = [("_ID".to_string(), Value::from("abc"))].into_iter().collect();
        let doc = normalize_document(doc).unwrap();
        assert_eq!(doc.identity(), Some(&Value::String("abc".into())));
    }

    #[test]
    fn numeric_identity_is_rejected() {
        let doc: Document = [("_id".to_string(), Value::from(7_i64))].into_iter().collect();
        assert!(normalize_document(doc).is_err());
    }
}
