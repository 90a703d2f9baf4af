use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Stable key a dataset's cursor is stored under: `<namespace>.<collection>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DatasetKey(Arc<str>);

impl DatasetKey {
    pub fn new(namespace: &str, collection: &str) -> Self {
        Self(Arc::from(format!("{namespace}.{collection}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DatasetKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&str> for DatasetKey {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<DatasetKey> for String {
    fn from(key: DatasetKey) -> Self {
        key.0.to_string()
    }
}

/// Identifier of a single sync run, used to correlate log lines.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RunId(Arc<str>);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
