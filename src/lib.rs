//! framecut library
//!
//! Resolves local files or links into in-memory videos, runs them through an
//! ffmpeg engine to extract frames or cut segments, and dispatches every
//! result to a local folder, the Downloads folder or a Google Drive folder.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod ports;
pub mod resolver;
pub mod utils;

// Re-export commonly used types
pub use app::{AppContainer, RunSummary, SessionOrchestrator};
pub use domain::errors::{
    ConfigError, DispatchError, EngineError, ResolutionError, SessionError,
};
pub use domain::model::{
    GeneratedArtifact, LogKind, LogMessage, MediaFile, MediaSource, ProcessingMode, SessionState,
};
pub use error::{FramecutError, FramecutResult};
