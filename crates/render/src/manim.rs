//! Rendering of Manim scripts into MP4 files.
//!
//! Each job renders in its own scratch directory under the configured temp
//! dir. The directory is removed when rendering fails or is cancelled;
//! after success it travels with the [`ArtifactHandle`] and the artifact
//! store removes it once the video has been copied out.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use vidgen_core::types::JobId;
use vidgen_pipeline::collaborators::{ArtifactHandle, CollaboratorError, Renderer};

use crate::config::RenderConfig;
use crate::scene::extract_scene_class;
use crate::subprocess::{run_command, tail, ProcessError};

/// Rendered files at or below this size are treated as broken output.
pub const MIN_VIDEO_BYTES: u64 = 1000;

/// Name of the script file written into the scratch directory.
const SCRIPT_FILE: &str = "scene.py";

/// How much of Manim's stderr is kept in an error message.
const STDERR_TAIL_CHARS: usize = 2000;

pub struct ManimRenderer {
    config: RenderConfig,
}

impl ManimRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn build_command(&self, script_path: &Path, scene_class: &str, work_dir: &Path) -> Command {
        let media_dir = work_dir.join("media");
        let mut cmd = Command::new(&self.config.manim_binary);
        cmd.arg(script_path)
            .arg(scene_class)
            .arg("-ql")
            .arg("--disable_caching")
            .arg(format!("--media_dir={}", media_dir.display()))
            .current_dir(work_dir)
            .env("PYTHONIOENCODING", "utf-8");
        if !cfg!(windows) {
            cmd.env("LANG", "en_US.UTF-8");
        }
        if tracing::enabled!(tracing::Level::DEBUG) {
            cmd.arg("-v");
        }
        cmd
    }
}

#[async_trait]
impl Renderer for ManimRenderer {
    async fn render(&self, script: &str, job_id: JobId) -> Result<ArtifactHandle, CollaboratorError> {
        let scratch = ScratchDir::create(&self.config.temp_dir, job_id).await?;
        tracing::debug!(%job_id, dir = %scratch.path().display(), "Created scratch directory");

        let script_path = scratch.path().join(SCRIPT_FILE);
        tokio::fs::write(&script_path, script).await?;
        tokio::fs::create_dir_all(scratch.path().join("media")).await?;

        let scene_class = extract_scene_class(script);
        let mut cmd = self.build_command(&script_path, &scene_class, scratch.path());
        tracing::info!(%job_id, %scene_class, "Executing Manim");

        let output = run_command(&mut cmd, self.config.process_timeout)
            .await
            .map_err(|e| match e {
                ProcessError::Timeout { elapsed_ms } => CollaboratorError::Timeout { elapsed_ms },
                ProcessError::Io(e) => CollaboratorError::Io(e),
            })?;

        tracing::info!(
            %job_id,
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            "Manim finished",
        );
        if !output.stdout.is_empty() {
            tracing::debug!(%job_id, stdout = %output.stdout, "Manim stdout");
        }
        if !output.success() {
            tracing::warn!(%job_id, stderr = %output.stderr, "Manim failed");
            return Err(CollaboratorError::Failed(format!(
                "Manim execution failed (exit code {}): {}",
                output.exit_code,
                tail(&output.stderr, STDERR_TAIL_CHARS)
            )));
        }

        let video = find_video(scratch.path()).await?.ok_or_else(|| {
            CollaboratorError::ArtifactMissing("No video file generated by Manim".into())
        })?;
        tracing::info!(%job_id, video = %video.display(), "Found rendered video");

        Ok(ArtifactHandle::new(video).with_scratch_dir(scratch.keep()))
    }
}

/// First `.mp4` under `root` larger than [`MIN_VIDEO_BYTES`], searching
/// depth-first in name order.
pub async fn find_video(root: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            entries.push(entry.path());
        }
        entries.sort();

        let mut subdirs = Vec::new();
        for path in entries {
            let meta = tokio::fs::metadata(&path).await?;
            if meta.is_dir() {
                subdirs.push(path);
            } else if path.extension().is_some_and(|ext| ext == "mp4") {
                if meta.len() > MIN_VIDEO_BYTES {
                    return Ok(Some(path));
                }
                tracing::debug!(path = %path.display(), size = meta.len(), "Skipping undersized video");
            }
        }
        // Reverse so the stack pops subdirectories in name order.
        pending.extend(subdirs.into_iter().rev());
    }
    Ok(None)
}

/// Per-job working directory, removed on drop unless kept.
struct ScratchDir {
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    async fn create(parent: &Path, job_id: JobId) -> std::io::Result<Self> {
        let path = parent.join(format!("manim_{job_id}"));
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_dir_all(&path).await?;
        }
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path, keep: false })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the directory over to the caller.
    fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                tracing::debug!(dir = %self.path.display(), error = %e, "Scratch cleanup failed");
            }
        }
    }
}
