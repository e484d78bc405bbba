//! Output dispatching: one sink per run, every artifact handled independently

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::errors::{ConfigError, DispatchError};
use crate::domain::model::GeneratedArtifact;
use crate::ports::{ArtifactSink, DownloadHost};

pub mod download;
pub mod drive;
pub mod local;

pub use download::{DownloadsFolderHost, ForcedDownloadSink};
pub use drive::{DriveAccess, DriveUploader, GoogleConfig, PromptFolderPicker};
pub use local::{LocalDirectory, LocalDirectorySink};

/// Where the user wants the results to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    LocalDirectory(LocalDirectory),
    ForcedDownload,
    RemoteFolder { folder_id: String },
}

impl OutputSink {
    pub fn label(&self) -> String {
        match self {
            OutputSink::LocalDirectory(dir) => format!("folder {}", dir.path().display()),
            OutputSink::ForcedDownload => "downloads".to_string(),
            OutputSink::RemoteFolder { folder_id } => format!("Google Drive folder {}", folder_id),
        }
    }
}

/// Collaborators a sink may need, owned by the session
#[derive(Clone)]
pub struct SinkEnvironment {
    pub download_host: Arc<dyn DownloadHost>,
    pub http: reqwest::Client,
    pub google: GoogleConfig,
    pub access_token: Option<String>,
}

impl SinkEnvironment {
    /// Turn the user's choice into a concrete sink.
    ///
    /// Only the remote folder can fail here, on credentials or token.
    pub fn build(&self, sink: &OutputSink) -> Result<Arc<dyn ArtifactSink>, ConfigError> {
        let built: Arc<dyn ArtifactSink> = match sink {
            OutputSink::LocalDirectory(dir) => Arc::new(LocalDirectorySink::new(dir.clone())),
            OutputSink::ForcedDownload => {
                Arc::new(ForcedDownloadSink::new(Arc::clone(&self.download_host)))
            }
            OutputSink::RemoteFolder { folder_id } => {
                if folder_id.trim().is_empty() {
                    return Err(ConfigError::Invalid("no remote folder selected".to_string()));
                }
                let access = DriveAccess::new(
                    self.http.clone(),
                    self.google.clone(),
                    self.access_token.clone(),
                )?;
                Arc::new(access.uploader(folder_id.trim()))
            }
        };
        Ok(built)
    }
}

/// Dispatches artifacts to one sink and counts the successes
pub struct OutputDispatcher {
    sink: Arc<dyn ArtifactSink>,
    dispatched: usize,
    failed: usize,
}

impl OutputDispatcher {
    pub fn new(sink: Arc<dyn ArtifactSink>) -> Self {
        Self {
            sink,
            dispatched: 0,
            failed: 0,
        }
    }

    pub fn describe(&self) -> String {
        self.sink.describe()
    }

    /// Dispatch one artifact. A failure is returned to the caller and
    /// counted, it never poisons later artifacts.
    pub async fn dispatch(&mut self, artifact: &GeneratedArtifact) -> Result<(), DispatchError> {
        match self.sink.dispatch(artifact).await {
            Ok(()) => {
                self.dispatched += 1;
                debug!(filename = %artifact.filename, total = self.dispatched, "Dispatched");
                Ok(())
            }
            Err(e) => {
                self.failed += 1;
                warn!(error = %e, "Dispatch failed");
                Err(e)
            }
        }
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}
