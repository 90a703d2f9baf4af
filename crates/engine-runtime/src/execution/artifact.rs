use connectors::storage::{BlobSink, PublishError};
use model::core::dataset::Dataset;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// How the next append treats the local artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactMode {
    /// Create (or truncate) the file and write a fresh header.
    New,
    /// Append below the header already in the file.
    Append,
}

impl ArtifactMode {
    pub fn is_new(self) -> bool {
        self == ArtifactMode::New
    }
}

/// Local directory holding the working copy of every artifact.
///
/// The published object is authoritative: a local copy is only reused when
/// its size matches the remote one, otherwise it is refreshed from the sink.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Staging { dir: dir.into() }
    }

    pub fn path_for(&self, dataset: &Dataset) -> PathBuf {
        self.dir.join(dataset.artifact_name())
    }

    pub async fn prepare(
        &self,
        dataset: &Dataset,
        sink: &dyn BlobSink,
        replace: bool,
    ) -> Result<ArtifactMode, PublishError> {
        if replace {
            debug!("Full refresh, rewriting artifact");
            return Ok(ArtifactMode::New);
        }

        let name = dataset.artifact_name();
        let remote_size = match sink.exists(&name).await? {
            None | Some(0) => {
                debug!("No published artifact {name}, starting a new one");
                return Ok(ArtifactMode::New);
            }
            Some(size) => size,
        };

        let path = self.path_for(dataset);
        let local_size = tokio::fs::metadata(&path).await.ok().map(|m| m.len());
        if local_size == Some(remote_size) {
            debug!("Reusing staged copy of {name} ({remote_size} bytes)");
            return Ok(ArtifactMode::Append);
        }

        info!("Refreshing staged copy of {name} from the sink");
        sink.download(&name, &path).await?;
        Ok(ArtifactMode::Append)
    }

    /// Drops the local copy after a failed append or publish so the next run
    /// starts again from the published artifact.
    pub async fn discard(&self, dataset: &Dataset) {
        let path = self.path_for(dataset);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Discarded staged copy {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to discard staged copy {}: {e}", path.display()),
        }
    }
}
