//! Transcoding engine module
//!
//! The engine itself is an external `ffmpeg` executable driven through the
//! [`TranscodeEngine`] port. A session owns exactly one [`EngineSlot`]: the
//! engine is loaded on first use, reused by every later run and never
//! unloaded while the session lives.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;

use crate::domain::errors::EngineError;
use crate::ports::{EngineLoader, TranscodeEngine};

pub mod ffmpeg;
pub mod pipeline;
pub mod progress;

pub use ffmpeg::{FfmpegEngine, FfmpegLoader};
pub use pipeline::{ArtifactStream, TranscodePipeline, INPUT_FILE_NAME};

/// Transcoding engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// ffmpeg executable (name on PATH or absolute path)
    pub ffmpeg_path: String,
    /// ffprobe executable, used for progress percentages
    pub ffprobe_path: String,
    /// Worker threads handed to ffmpeg
    pub threads: usize,
    /// Stderr lines kept for error reports
    pub stderr_tail_lines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            threads: num_cpus::get(),
            stderr_tail_lines: 20,
        }
    }
}

/// Session-scoped, load-once engine handle
pub struct EngineSlot {
    loader: Arc<dyn EngineLoader>,
    engine: OnceCell<Arc<dyn TranscodeEngine>>,
}

impl EngineSlot {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            engine: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    /// Return the loaded engine, loading it on first call.
    ///
    /// A failed load leaves the slot empty so a later run can try again.
    pub async fn get_or_load(&self) -> Result<Arc<dyn TranscodeEngine>, EngineError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                info!("Loading transcoding engine");
                let engine = self.loader.load().await?;
                info!(engine = engine.name(), "Transcoding engine ready");
                Ok::<_, EngineError>(engine)
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}
