use crate::storage::{BlobSink, PublishError, PublicUrl};
use async_trait::async_trait;
use futures_util::StreamExt;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload,
    gcp::GoogleCloudStorageBuilder, local::LocalFileSystem, memory::InMemory,
    path::Path as ObjectPath,
};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub const DEFAULT_PREFIX: &str = "DaXSome/datasets";
const CSV_CONTENT_TYPE: &str = "application/csv";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Backend {
    Gcs { bucket: String },
    Local { root: PathBuf },
    Memory,
}

impl Backend {
    fn parse(url: &str) -> Result<Self, PublishError> {
        if let Some(rest) = url
            .strip_prefix("gcs://")
            .or_else(|| url.strip_prefix("gs://"))
        {
            let bucket = rest.trim_end_matches('/');
            if bucket.is_empty() || bucket.contains('/') {
                return Err(PublishError::InvalidUrl(url.to_string()));
            }
            return Ok(Backend::Gcs {
                bucket: bucket.to_string(),
            });
        }

        if let Some(path) = url.strip_prefix("file://") {
            if path.is_empty() {
                return Err(PublishError::InvalidUrl(url.to_string()));
            }
            return Ok(Backend::Local {
                root: PathBuf::from(path),
            });
        }

        if url == "memory://" || url == "memory:" {
            return Ok(Backend::Memory);
        }

        Err(PublishError::InvalidUrl(url.to_string()))
    }

    fn default_public_url(&self) -> PublicUrl {
        match self {
            Backend::Gcs { bucket } => PublicUrl::firebase(bucket),
            Backend::Local { root } => PublicUrl::new(format!("file://{}", root.display()), ""),
            Backend::Memory => PublicUrl::new("memory://", ""),
        }
    }
}

/// [`BlobSink`] over any `object_store` backend.
///
/// Every artifact is stored at `<prefix>/<file name>`.
///
/// `object_store` has no per-object ACLs, so uploads are not made public
/// individually. Public read on the returned URLs must be granted at the
/// bucket level, e.g. `allUsers` as `roles/storage.objectViewer` on GCS.
#[derive(Clone)]
pub struct ObjectStorePublisher {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    public_url: PublicUrl,
}

impl fmt::Debug for ObjectStorePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectStorePublisher<{}/{}>", self.store, self.prefix)
    }
}

impl ObjectStorePublisher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        prefix: impl Into<String>,
        public_url: PublicUrl,
    ) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        ObjectStorePublisher {
            store,
            prefix,
            public_url,
        }
    }

    /// Opens the backend named by `url` (`gcs://bucket`, `file:///dir` or
    /// `memory://`). Without an explicit `public_url` the backend default is
    /// used, which for GCS is the Firebase download endpoint of the bucket.
    pub async fn from_url(
        url: &str,
        prefix: Option<&str>,
        public_url: Option<PublicUrl>,
    ) -> Result<Self, PublishError> {
        let backend = Backend::parse(url)?;
        let public_url = public_url.unwrap_or_else(|| backend.default_public_url());

        let store: Arc<dyn ObjectStore> = match &backend {
            Backend::Gcs { bucket } => {
                let gcs = GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| PublishError::Config(e.to_string()))?;
                Arc::new(gcs)
            }
            Backend::Local { root } => {
                tokio::fs::create_dir_all(root).await?;
                Arc::new(LocalFileSystem::new_with_prefix(root)?)
            }
            Backend::Memory => Arc::new(InMemory::new()),
        };

        info!("Publishing artifacts to {url}");
        Ok(Self::new(store, prefix.unwrap_or(DEFAULT_PREFIX), public_url))
    }

    pub fn object_path(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    pub fn public_url(&self, name: &str) -> String {
        self.public_url.for_object(&self.object_path(name))
    }

    fn location(&self, name: &str) -> ObjectPath {
        ObjectPath::from(self.object_path(name))
    }
}

#[async_trait]
impl BlobSink for ObjectStorePublisher {
    async fn exists(&self, name: &str) -> Result<Option<u64>, PublishError> {
        match self.store.head(&self.location(name)).await {
            Ok(meta) => Ok(Some(meta.size)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn download(&self, name: &str, dest: &Path) -> Result<u64, PublishError> {
        let result = self.store.get(&self.location(name)).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = result.into_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;

        debug!("Downloaded {} ({} bytes) to {}", name, written, dest.display());
        Ok(written)
    }

    async fn upload(&self, local_path: &Path) -> Result<String, PublishError> {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PublishError::Config(format!(
                    "artifact path {} has no file name",
                    local_path.display()
                ))
            })?;

        let bytes = tokio::fs::read(local_path).await?;
        let size = bytes.len();
        let opts = PutOptions {
            attributes: Attributes::from_iter([(
                Attribute::ContentType,
                AttributeValue::from(CSV_CONTENT_TYPE),
            )]),
            ..Default::default()
        };

        self.store
            .put_opts(&self.location(name), PutPayload::from(bytes), opts)
            .await?;

        let url = self.public_url(name);
        info!("Uploaded {} ({} bytes) to {}", name, size, url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_backend_urls() {
        assert_eq!(
            Backend::parse("gcs://daxsome.appspot.com").unwrap(),
            Backend::Gcs {
                bucket: "daxsome.appspot.com".into()
            }
        );
        assert_eq!(
            Backend::parse("file:///tmp/out").unwrap(),
            Backend::Local {
                root: PathBuf::from("/tmp/out")
            }
        );
        assert_eq!(Backend::parse("memory://").unwrap(), Backend::Memory);
        assert!(Backend::parse("s3://bucket").is_err());
        assert!(Backend::parse("gcs://").is_err());
    }

    #[tokio::test]
    async fn upload_then_exists_and_download() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("shop-orders.csv");
        tokio::fs::write(&local, "a,b\n1,2\n").await.unwrap();

        let publisher = ObjectStorePublisher::from_url("memory://", None, None)
            .await
            .unwrap();

        assert_eq!(publisher.exists("shop-orders.csv").await.unwrap(), None);

        let url = publisher.upload(&local).await.unwrap();
        assert_eq!(url, "memory:///DaXSome%2Fdatasets%2Fshop-orders.csv");
        assert_eq!(publisher.exists("shop-orders.csv").await.unwrap(), Some(8));

        let meta = publisher
            .store
            .get(&publisher.location("shop-orders.csv"))
            .await
            .unwrap();
        assert_eq!(
            meta.attributes.get(&Attribute::ContentType).map(|v| &**v),
            Some(CSV_CONTENT_TYPE)
        );

        let copy = dir.path().join("staging").join("shop-orders.csv");
        let written = publisher.download("shop-orders.csv", &copy).await.unwrap();
        assert_eq!(written, 8);
        assert_eq!(tokio::fs::read_to_string(&copy).await.unwrap(), "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn download_of_missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let publisher = ObjectStorePublisher::from_url("memory://", Some("x"), None)
            .await
            .unwrap();
        let err = publisher
            .download("nope.csv", &dir.path().join("nope.csv"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn local_backend_writes_under_prefix() {
        let root = tempdir().unwrap();
        let staging = tempdir().unwrap();
        let local = staging.path().join("a-b.csv");
        tokio::fs::write(&local, "x\n1\n").await.unwrap();

        let url = format!("file://{}", root.path().display());
        let publisher = ObjectStorePublisher::from_url(&url, Some("out"), None)
            .await
            .unwrap();
        publisher.upload(&local).await.unwrap();

        let stored = root.path().join("out").join("a-b.csv");
        assert_eq!(tokio::fs::read_to_string(stored).await.unwrap(), "x\n1\n");
    }
}
