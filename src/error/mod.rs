//! Error handling module for framecut

use thiserror::Error;

use crate::domain::errors::{ConfigError, EngineError, ResolutionError, SessionError};

/// Main error type for framecut operations
#[derive(Error, Debug)]
pub enum FramecutError {
    /// Run rejected before any work started
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Link could not be turned into a media file
    #[error("Could not load the video: {0}")]
    Resolution(#[from] ResolutionError),

    /// Transcoding engine failed
    #[error("Processing failed: {0}")]
    Engine(#[from] EngineError),

    /// Remote-storage configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local file system failure outside the sinks
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for framecut operations
pub type FramecutResult<T> = std::result::Result<T, FramecutError>;
