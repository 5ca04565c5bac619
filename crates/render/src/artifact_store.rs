use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vidgen_core::job::ArtifactRef;
use vidgen_core::types::JobId;
use vidgen_pipeline::collaborators::{ArtifactHandle, ArtifactStore, CollaboratorError};

/// Keeps finished videos as `<videos_dir>/<job_id>.mp4`.
///
/// The artifact reference is the stored file path.
pub struct LocalArtifactStore {
    videos_dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(videos_dir: impl Into<PathBuf>) -> Self {
        Self {
            videos_dir: videos_dir.into(),
        }
    }

    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    /// Create the videos directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.videos_dir).await
    }

    fn target_for(&self, job_id: JobId) -> PathBuf {
        self.videos_dir.join(format!("{job_id}.mp4"))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn persist(&self, job_id: JobId, handle: ArtifactHandle) -> Result<ArtifactRef, CollaboratorError> {
        self.ensure_dir().await?;
        let target = self.target_for(job_id);

        let copied = tokio::fs::copy(&handle.path, &target).await;
        if let Some(scratch) = &handle.scratch_dir {
            if let Err(e) = tokio::fs::remove_dir_all(scratch).await {
                tracing::warn!(%job_id, dir = %scratch.display(), error = %e, "Failed to remove scratch directory");
            }
        }
        copied.map_err(|e| {
            CollaboratorError::ArtifactMissing(format!(
                "failed to copy {} to {}: {e}",
                handle.path.display(),
                target.display()
            ))
        })?;

        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(CollaboratorError::ArtifactMissing(
                "Failed to copy video to permanent location".into(),
            ));
        }

        tracing::info!(%job_id, path = %target.display(), "Video stored");
        Ok(ArtifactRef::new(target.to_string_lossy()))
    }

    async fn remove(&self, artifact: &ArtifactRef) -> Result<(), CollaboratorError> {
        match tokio::fs::remove_file(self.path_of(artifact)).await {
            Ok(()) => {
                tracing::debug!(%artifact, "Video removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CollaboratorError::Io(e)),
        }
    }
}
