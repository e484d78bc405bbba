// Domain models - Core types and data structures

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A video that has been fully materialized into memory.
///
/// This is the only form of input the transcoding pipeline accepts.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub binary: Vec<u8>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, binary: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            binary,
        }
    }

    /// Read a local file into memory
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let binary = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.mp4".to_string());
        Ok(Self { name, binary })
    }

    pub fn size(&self) -> usize {
        self.binary.len()
    }
}

impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("name", &self.name)
            .field("size", &self.binary.len())
            .finish()
    }
}

/// User supplied input, either already in memory or still a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    File(MediaFile),
    Url(String),
}

impl MediaSource {
    pub fn is_resolved(&self) -> bool {
        matches!(self, MediaSource::File(_))
    }

    pub fn describe(&self) -> String {
        match self {
            MediaSource::File(file) => file.name.clone(),
            MediaSource::Url(raw) => raw.clone(),
        }
    }
}

/// What the transcoding engine should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// One still image per second of video
    ExtractFrames,
    /// Stream-copied segments of bounded duration
    CutSegments { segment_seconds: i64 },
}

impl ProcessingMode {
    /// File name prefix of every artifact produced in this mode
    pub fn output_prefix(&self) -> &'static str {
        match self {
            ProcessingMode::ExtractFrames => "frame_",
            ProcessingMode::CutSegments { .. } => "output_",
        }
    }

    pub fn output_extension(&self) -> &'static str {
        match self {
            ProcessingMode::ExtractFrames => ".png",
            ProcessingMode::CutSegments { .. } => ".mp4",
        }
    }

    /// Sequential numbering pattern handed to the engine
    pub fn output_pattern(&self) -> &'static str {
        match self {
            ProcessingMode::ExtractFrames => "frame_%04d.png",
            ProcessingMode::CutSegments { .. } => "output_%03d.mp4",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ProcessingMode::ExtractFrames => "image/png",
            ProcessingMode::CutSegments { .. } => "video/mp4",
        }
    }

    /// Whether a workspace entry is one of this mode's outputs
    pub fn matches_output(&self, filename: &str) -> bool {
        filename.starts_with(self.output_prefix()) && filename.ends_with(self.output_extension())
    }

    /// Noun used in completion messages
    pub fn artifact_noun(&self) -> &'static str {
        match self {
            ProcessingMode::ExtractFrames => "image",
            ProcessingMode::CutSegments { .. } => "clip",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::ExtractFrames => write!(f, "extract frames (1 fps)"),
            ProcessingMode::CutSegments { segment_seconds } => {
                write!(f, "cut segments ({}s)", segment_seconds)
            }
        }
    }
}

/// One output file produced by the engine, consumed exactly once
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub filename: String,
    pub binary: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedArtifact {
    pub fn new(filename: impl Into<String>, binary: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            binary,
            mime_type: mime_type.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.binary.len()
    }
}

impl fmt::Debug for GeneratedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedArtifact")
            .field("filename", &self.filename)
            .field("size", &self.binary.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Percentage of the active run. Never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunProgress {
    value: u8,
}

impl RunProgress {
    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// Move forward to `percent`, clamped to 100.
    ///
    /// Returns true when the stored value changed.
    pub fn advance(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if percent > self.value {
            self.value = percent;
            true
        } else {
            false
        }
    }

    pub fn complete(&mut self) {
        self.value = 100;
    }
}

/// Severity of a session log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Entry of the append-only session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub id: u64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
}

/// Lifecycle of a session run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Validating,
    LoadingEngine,
    ResolvingInput,
    Transcoding,
    Dispatching,
    Completed,
    Error,
}

impl SessionState {
    /// States from which a new run (or a standalone resolution) may start
    pub fn accepts_new_run(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Completed | SessionState::Error
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Validating => "validating",
            SessionState::LoadingEngine => "loading engine",
            SessionState::ResolvingInput => "resolving input",
            SessionState::Transcoding => "transcoding",
            SessionState::Dispatching => "dispatching",
            SessionState::Completed => "completed",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests;
