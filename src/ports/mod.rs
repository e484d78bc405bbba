// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::engine::progress::Reporter;

/// Port for the external transcoding engine.
///
/// The engine owns a private workspace (its virtual filesystem); every file
/// name passed here is relative to that workspace.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &str;

    /// Stage bytes into the workspace under `name`
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Run one transcode command, reporting progress through `reporter`
    async fn exec(&self, args: &[String], reporter: &Reporter) -> Result<(), EngineError>;

    /// List regular files currently in the workspace
    async fn list_dir(&self) -> Result<Vec<String>, EngineError>;

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    async fn delete_file(&self, name: &str) -> Result<(), EngineError>;
}

/// Port for bringing an engine instance to life
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn TranscodeEngine>, EngineError>;
}

/// Port for turning a link into an in-memory media file
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, raw_url: &str, reporter: &Reporter)
        -> Result<MediaFile, ResolutionError>;
}

/// One output destination. Implementations write or upload a single artifact.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Human readable destination, used in log lines
    fn describe(&self) -> String;

    async fn dispatch(&self, artifact: &GeneratedArtifact) -> Result<(), DispatchError>;
}

/// Port for the host's "save this file for the user" action
#[async_trait]
pub trait DownloadHost: Send + Sync {
    /// Save the transient file at `transient` under `filename`; returns where
    /// the user will find it. `transient` is released right after the call.
    async fn trigger_save(&self, transient: &Path, filename: &str) -> Result<PathBuf, String>;
}

/// Remote folder chosen by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFolder {
    pub id: String,
    pub name: String,
}

/// Result of a folder picking interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Picked(PickedFolder),
    Cancelled,
}

/// Port for the external remote folder picker
#[async_trait]
pub trait FolderPicker: Send + Sync {
    async fn pick_folder(&self) -> Result<PickOutcome, ConfigError>;
}

/// Presentation layer hook for session events
pub trait SessionObserver: Send + Sync {
    fn on_state(&self, state: SessionState);

    fn on_progress(&self, percent: u8);

    fn on_log(&self, message: &LogMessage);
}

/// Observer that ignores everything
pub struct NoOpObserver;

impl SessionObserver for NoOpObserver {
    fn on_state(&self, _state: SessionState) {}
    fn on_progress(&self, _percent: u8) {}
    fn on_log(&self, _message: &LogMessage) {}
}
