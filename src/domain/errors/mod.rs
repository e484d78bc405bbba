// Domain errors - Error taxonomy for resolution, transcoding and dispatch

use thiserror::Error;

use crate::domain::model::SessionState;

/// Input could not be turned into a media binary.
///
/// User facing. The resolver performs its own internal retries before
/// surfacing one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ResolutionError {
    pub reason: String,
}

impl ResolutionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn no_direct_media() -> Self {
        Self::new("no direct media found")
    }

    pub fn too_small(size: usize) -> Self {
        Self::new(format!("resource too small ({} bytes)", size))
    }
}

/// Outcome of a failed strategy fetch. Internal to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The remote served a web page instead of media
    #[error("server returned a web page instead of a media file")]
    HtmlPageDetected,

    /// Strategy answered with a non-success status
    #[error("{strategy}: HTTP error {status}")]
    Http { strategy: String, status: u16 },

    /// Transport level failure (DNS, TLS, connection reset, timeout)
    #[error("{strategy}: network error: {message}")]
    Network { strategy: String, message: String },

    /// No strategy recorded any error (empty strategy list)
    #[error("could not connect to the media resource")]
    Unreachable,
}

/// Failure of a single social extraction call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("extraction API error (status {0})")]
    Status(u16),

    #[error("{0}")]
    Rejected(String),

    #[error("no direct video link found")]
    NoMediaUrl,

    #[error("extraction request failed: {0}")]
    Network(String),

    #[error("invalid extraction response: {0}")]
    InvalidResponse(String),
}

/// Transcoding engine unavailable or command failed. Fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("transcoding engine unavailable: {0}")]
    Unavailable(String),

    #[error("transcode command failed (exit code {code:?}): {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("engine workspace error: {0}")]
    Workspace(String),
}

/// Per-artifact dispatch failure. Logged, never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("could not save {filename}: {message}")]
    Local { filename: String, message: String },

    #[error("could not download {filename}: {message}")]
    Download { filename: String, message: String },

    #[error("upload of {filename} failed: {message}")]
    Remote { filename: String, message: String },
}

/// Missing or invalid remote-storage configuration.
///
/// Only blocks remote-folder operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing {0}; run `framecut config set-credentials`")]
    MissingCredential(&'static str),

    #[error("{field} looks invalid (expected at least {min} characters)")]
    CredentialTooShort { field: &'static str, min: usize },

    #[error("missing Google Drive access token (pass --access-token or set FRAMECUT_DRIVE_TOKEN)")]
    MissingAccessToken,

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("configuration file error: {0}")]
    File(String),
}

/// A run was rejected before any work started
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a run is already in progress ({0})")]
    Busy(SessionState),

    #[error("no video selected")]
    NoMediaSource,

    #[error("no output destination selected")]
    NoOutputSink,

    #[error("segment length must be greater than 0 (got {0})")]
    InvalidSegmentLength(i64),

    #[error("{0} is not a video file")]
    NotAVideo(String),

    #[error("cannot save to {path}: {reason}")]
    InvalidOutputDirectory { path: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
