use crate::core::identifiers::DatasetKey;
use serde::{Deserialize, Serialize};

/// One logical source table mirrored into one CSV artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dataset {
    pub namespace: String,
    pub collection: String,
    /// Drop the raw `_id` column when the artifact header is first written.
    #[serde(default = "default_hide_identity")]
    pub hide_identity: bool,
}

fn default_hide_identity() -> bool {
    true
}

impl Dataset {
    pub fn new(namespace: impl Into<String>, collection: impl Into<String>) -> Self {
        Dataset {
            namespace: namespace.into(),
            collection: collection.into(),
            hide_identity: default_hide_identity(),
        }
    }

    pub fn with_hide_identity(mut self, hide: bool) -> Self {
        self.hide_identity = hide;
        self
    }

    pub fn key(&self) -> DatasetKey {
        DatasetKey::new(&self.namespace, &self.collection)
    }

    /// File name of the artifact, shared by the staging area and the blob sink.
    ///
    /// Not unique when namespaces or collections contain `-`; the engine
    /// refuses a second dataset claiming the same name.
    pub fn artifact_name(&self) -> String {
        format!("{}-{}.csv", self.namespace, self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_uses_dash_separator() {
        let ds = Dataset::new("analytics", "events");
        assert_eq!(ds.artifact_name(), "analytics-events.csv");
        assert!(ds.hide_identity);
    }

    #[test]
    fn hide_identity_defaults_when_absent() {
        let ds: Dataset =
            serde_json::from_str(r#"{"namespace":"a","collection":"b"}"#).unwrap();
        assert!(ds.hide_identity);
    }
}
