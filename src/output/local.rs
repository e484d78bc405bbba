//! Local directory sink

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::errors::{DispatchError, SessionError};
use crate::domain::model::GeneratedArtifact;
use crate::ports::ArtifactSink;

/// Handle to an existing, writable directory chosen by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDirectory {
    path: PathBuf,
}

impl LocalDirectory {
    /// Validate `path` as an output directory
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let rejected = |reason: String| SessionError::InvalidOutputDirectory {
            path: path.display().to_string(),
            reason,
        };

        let metadata = std::fs::metadata(&path).map_err(|e| rejected(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(rejected("not a directory".to_string()));
        }
        if metadata.permissions().readonly() {
            return Err(rejected("directory is read-only".to_string()));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Writes artifacts as plain files under a [`LocalDirectory`]
pub struct LocalDirectorySink {
    directory: LocalDirectory,
}

impl LocalDirectorySink {
    pub fn new(directory: LocalDirectory) -> Self {
        Self { directory }
    }

    async fn write(&self, artifact: &GeneratedArtifact) -> std::io::Result<PathBuf> {
        let target = self.directory.path().join(&artifact.filename);
        // the handle is dropped (closed) on every return path below
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&target)
            .await?;
        file.write_all(&artifact.binary).await?;
        file.flush().await?;
        Ok(target)
    }
}

#[async_trait]
impl ArtifactSink for LocalDirectorySink {
    fn describe(&self) -> String {
        format!("folder {}", self.directory.path().display())
    }

    async fn dispatch(&self, artifact: &GeneratedArtifact) -> Result<(), DispatchError> {
        let target = self.write(artifact).await.map_err(|e| DispatchError::Local {
            filename: artifact.filename.clone(),
            message: e.to_string(),
        })?;
        debug!(path = %target.display(), bytes = artifact.size(), "Artifact written");
        Ok(())
    }
}
