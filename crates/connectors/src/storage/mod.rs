pub mod error;
pub mod publisher;
pub mod url;

pub use error::PublishError;
pub use publisher::ObjectStorePublisher;
pub use url::PublicUrl;

use async_trait::async_trait;
use std::path::Path;

/// Remote namespace that artifacts are published into.
#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Size of the remote object, or `None` when it does not exist.
    async fn exists(&self, name: &str) -> Result<Option<u64>, PublishError>;

    /// Copies the remote object into `dest`, returning the bytes written.
    async fn download(&self, name: &str, dest: &Path) -> Result<u64, PublishError>;

    /// Uploads the file at `local_path` under its file name and returns the
    /// public URL of the object.
    async fn upload(&self, local_path: &Path) -> Result<String, PublishError>;
}
