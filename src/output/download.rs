//! Forced-download sink and the default downloads-folder host

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::domain::errors::DispatchError;
use crate::domain::model::GeneratedArtifact;
use crate::ports::{ArtifactSink, DownloadHost};

/// Hands every artifact to the host's save action through a transient file
pub struct ForcedDownloadSink {
    host: Arc<dyn DownloadHost>,
}

impl ForcedDownloadSink {
    pub fn new(host: Arc<dyn DownloadHost>) -> Self {
        Self { host }
    }

    fn transient(artifact: &GeneratedArtifact) -> std::io::Result<NamedTempFile> {
        let mut transient = tempfile::Builder::new()
            .prefix("framecut-dl-")
            .tempfile()?;
        transient.write_all(&artifact.binary)?;
        transient.flush()?;
        Ok(transient)
    }
}

#[async_trait]
impl ArtifactSink for ForcedDownloadSink {
    fn describe(&self) -> String {
        "downloads".to_string()
    }

    async fn dispatch(&self, artifact: &GeneratedArtifact) -> Result<(), DispatchError> {
        let failure = |message: String| DispatchError::Download {
            filename: artifact.filename.clone(),
            message,
        };

        let transient = Self::transient(artifact).map_err(|e| failure(e.to_string()))?;
        let saved = self
            .host
            .trigger_save(transient.path(), &artifact.filename)
            .await;
        // release the transient reference whatever the host did
        drop(transient);

        let saved = saved.map_err(failure)?;
        debug!(path = %saved.display(), "Download saved");
        Ok(())
    }
}

/// Saves into a downloads folder the way a browser does: never overwrite,
/// pick `name (1).ext`, `name (2).ext`, ... instead
pub struct DownloadsFolderHost {
    directory: PathBuf,
}

impl DownloadsFolderHost {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// The user's Downloads folder, or the current directory when unknown
    pub fn user_default() -> Self {
        let directory = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(directory)
    }

    fn free_path(&self, filename: &str) -> PathBuf {
        let candidate = self.directory.join(filename);
        if !candidate.exists() {
            return candidate;
        }

        let (stem, extension) = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{}", ext)),
            _ => (filename, String::new()),
        };
        (1u32..)
            .map(|n| self.directory.join(format!("{} ({}){}", stem, n, extension)))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }
}

#[async_trait]
impl DownloadHost for DownloadsFolderHost {
    async fn trigger_save(&self, transient: &Path, filename: &str) -> Result<PathBuf, String> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| format!("cannot create {}: {}", self.directory.display(), e))?;

        let target = self.free_path(filename);
        tokio::fs::copy(transient, &target)
            .await
            .map_err(|e| format!("cannot save to {}: {}", target.display(), e))?;

        info!(path = %target.display(), "Saved download");
        Ok(target)
    }
}
