use model::records::document::{Document, IDENTITY_FIELD};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// How the header of a brand-new artifact is derived from its first batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPolicy {
    /// Sorted keys of the first document only. Callers keep batches homogeneous.
    #[default]
    FirstDocument,

    /// Sorted union of the keys of every document in the batch.
    BatchUnion,
}

impl FromStr for HeaderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" | "first_document" | "first-document" => Ok(HeaderPolicy::FirstDocument),
            "union" | "batch_union" | "batch-union" => Ok(HeaderPolicy::BatchUnion),
            other => Err(format!("Unknown header policy: {other}")),
        }
    }
}

impl fmt::Display for HeaderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderPolicy::FirstDocument => f.write_str("first_document"),
            HeaderPolicy::BatchUnion => f.write_str("batch_union"),
        }
    }
}

/// Column list of an artifact. Fixed once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    pub fn new(columns: Vec<String>) -> Self {
        Header { columns }
    }

    /// Derives the header for a new artifact; `None` for an empty batch.
    ///
    /// When the first document has no visible field the whole batch is
    /// consulted instead. The result may still be empty.
    pub fn derive(
        documents: &[Document],
        policy: HeaderPolicy,
        hide_identity: bool,
    ) -> Option<Self> {
        let first = documents.first()?;
        let visible = |keys: BTreeSet<&String>| -> Vec<String> {
            keys.into_iter()
                .filter(|key| !(hide_identity && key.as_str() == IDENTITY_FIELD))
                .cloned()
                .collect()
        };
        let union = || visible(documents.iter().flat_map(Document::keys).collect());

        let columns = match policy {
            HeaderPolicy::FirstDocument => {
                let columns = visible(first.keys().collect());
                if columns.is_empty() { union() } else { columns }
            }
            HeaderPolicy::BatchUnion => union(),
        };

        Some(Header { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Renders `doc` in header order. Absent keys become empty cells.
    pub fn cells(&self, doc: &Document) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| doc.get(column).map(|v| v.to_cell()).unwrap_or_default())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;

    fn doc(fields: &[(&str, Value)]) -> Document {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn first_document_header_is_sorted_and_hides_identity() {
        let docs = vec![
            doc(&[
                ("zeta", 1_i64.into()),
                ("_id", Value::Identifier("x".into())),
                ("alpha", 2_i64.into()),
            ]),
            doc(&[("extra", 3_i64.into())]),
        ];
        let header = Header::derive(&docs, HeaderPolicy::FirstDocument, true).unwrap();
        assert_eq!(header.columns(), ["alpha", "zeta"]);
    }

    #[test]
    fn identity_kept_when_not_hidden() {
        let docs = vec![doc(&[("_id", Value::Identifier("x".into())), ("a", 1_i64.into())])];
        let header = Header::derive(&docs, HeaderPolicy::FirstDocument, false).unwrap();
        assert_eq!(header.columns(), ["_id", "a"]);
    }

    #[test]
    fn batch_union_collects_every_key() {
        let docs = vec![doc(&[("b", 1_i64.into())]), doc(&[("a", 2_i64.into())])];
        let header = Header::derive(&docs, HeaderPolicy::BatchUnion, true).unwrap();
        assert_eq!(header.columns(), ["a", "b"]);
    }

    #[test]
    fn missing_key_renders_empty_cell() {
        let header = Header::new(vec!["a".into(), "b".into()]);
        let cells = header.cells(&doc(&[("b", "x".into())]));
        assert_eq!(cells, ["", "x"]);
    }

    #[test]
    fn empty_batch_has_no_header() {
        assert!(Header::derive(&[], HeaderPolicy::FirstDocument, true).is_none());
    }

    #[test]
    fn identity_only_first_document_falls_back_to_batch_keys() {
        let docs = vec![
            doc(&[("_id", Value::Identifier("1".into()))]),
            doc(&[("_id", Value::Identifier("2".into())), ("b", 1_i64.into())]),
        ];
        let header = Header::derive(&docs, HeaderPolicy::FirstDocument, true).unwrap();
        assert_eq!(header.columns(), ["b"]);
    }
}
