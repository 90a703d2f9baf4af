use serde::{Deserialize, Serialize};

const FIREBASE_BASE: &str = "https://firebasestorage.googleapis.com/v0/b";
const FIREBASE_SUFFIX: &str = "?alt=media";

/// Builds the deterministic public URL of a published object.
///
/// The object path is appended to `base` with every `/` percent-encoded, the
/// way the Firebase download endpoint expects it, followed by `suffix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUrl {
    base: String,
    suffix: String,
}

impl PublicUrl {
    pub fn new(base: impl Into<String>, suffix: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        PublicUrl {
            base,
            suffix: suffix.into(),
        }
    }

    pub fn firebase(bucket: &str) -> Self {
        PublicUrl::new(format!("{FIREBASE_BASE}/{bucket}/o/"), FIREBASE_SUFFIX)
    }

    pub fn for_object(&self, path: &str) -> String {
        format!("{}{}{}", self.base, encode_path(path), self.suffix)
    }
}

pub fn encode_path(path: &str) -> String {
    path.replace('/', "%2F")
}
