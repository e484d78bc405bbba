//! Transcoding pipeline: stage the input, run one command, stream the outputs

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::EngineError;
use crate::domain::model::{GeneratedArtifact, MediaFile, ProcessingMode};
use crate::engine::progress::Reporter;
use crate::ports::TranscodeEngine;

/// Fixed workspace name of the staged input
pub const INPUT_FILE_NAME: &str = "input.mp4";

/// Drives a [`TranscodeEngine`] for one processing mode at a time
pub struct TranscodePipeline {
    engine: Arc<dyn TranscodeEngine>,
}

impl TranscodePipeline {
    pub fn new(engine: Arc<dyn TranscodeEngine>) -> Self {
        Self { engine }
    }

    /// Engine arguments for `mode`, relative to the workspace
    pub fn command_for(mode: &ProcessingMode) -> Vec<String> {
        let args: Vec<String> = match mode {
            ProcessingMode::CutSegments { segment_seconds } => vec![
                "-i".into(),
                INPUT_FILE_NAME.into(),
                "-c".into(),
                "copy".into(),
                "-map".into(),
                "0".into(),
                "-segment_time".into(),
                segment_seconds.to_string(),
                "-f".into(),
                "segment".into(),
                "-reset_timestamps".into(),
                "1".into(),
                mode.output_pattern().into(),
            ],
            ProcessingMode::ExtractFrames => vec![
                "-i".into(),
                INPUT_FILE_NAME.into(),
                "-vf".into(),
                "fps=1".into(),
                mode.output_pattern().into(),
            ],
        };
        args
    }

    /// Transcode `source` and return a lazy stream over the produced files.
    ///
    /// The engine is reused across runs, so leftovers of an earlier run
    /// that never drained its stream are removed before staging.
    pub async fn run(
        &self,
        mode: ProcessingMode,
        source: &MediaFile,
        reporter: &Reporter,
    ) -> Result<ArtifactStream, EngineError> {
        self.clear_stale_outputs(&mode).await?;

        reporter.info(format!("Staging {} into the engine", source.name));
        self.engine.write_file(INPUT_FILE_NAME, &source.binary).await?;

        let args = Self::command_for(&mode);
        info!(engine = self.engine.name(), %mode, "Running transcode");
        reporter.info(format!("Processing: {}", mode));

        if let Err(e) = self.engine.exec(&args, reporter).await {
            if let Err(cleanup) = self.engine.delete_file(INPUT_FILE_NAME).await {
                warn!(error = %cleanup, "Could not remove staged input after failure");
            }
            return Err(e);
        }

        let mut outputs: Vec<String> = self
            .engine
            .list_dir()
            .await?
            .into_iter()
            .filter(|name| mode.matches_output(name))
            .collect();
        outputs.sort();
        let pending = VecDeque::from(outputs);

        debug!(count = pending.len(), "Outputs found in workspace");
        Ok(ArtifactStream {
            engine: Arc::clone(&self.engine),
            mode,
            pending,
            input_name: Some(INPUT_FILE_NAME.to_string()),
        })
    }

    async fn clear_stale_outputs(&self, mode: &ProcessingMode) -> Result<(), EngineError> {
        for name in self.engine.list_dir().await? {
            if mode.matches_output(&name) {
                debug!(%name, "Removing stale output");
                self.engine.delete_file(&name).await?;
            }
        }
        Ok(())
    }
}

/// Lazy cursor over the artifacts of one run.
///
/// Each artifact is read and removed from the workspace only when pulled,
/// so at most one output binary is held in memory at a time.
pub struct ArtifactStream {
    engine: Arc<dyn TranscodeEngine>,
    mode: ProcessingMode,
    pending: VecDeque<String>,
    input_name: Option<String>,
}

impl ArtifactStream {
    /// Outputs not yet pulled
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Pull the next artifact. Returns `None` once exhausted, after the
    /// staged input has been released.
    pub async fn next(&mut self) -> Option<Result<GeneratedArtifact, EngineError>> {
        let Some(name) = self.pending.pop_front() else {
            if let Err(e) = self.release_input().await {
                return Some(Err(e));
            }
            return None;
        };

        let binary = match self.engine.read_file(&name).await {
            Ok(binary) => binary,
            Err(e) => return Some(Err(e)),
        };
        if let Err(e) = self.engine.delete_file(&name).await {
            return Some(Err(e));
        }

        Some(Ok(GeneratedArtifact::new(name, binary, self.mode.mime_type())))
    }

    /// Drop every unpulled output and release the staged input
    pub async fn finish(mut self) -> Result<(), EngineError> {
        while let Some(name) = self.pending.pop_front() {
            self.engine.delete_file(&name).await?;
        }
        self.release_input().await
    }

    async fn release_input(&mut self) -> Result<(), EngineError> {
        if let Some(input) = self.input_name.take() {
            self.engine.delete_file(&input).await?;
            debug!("Released staged input");
        }
        Ok(())
    }
}

impl Drop for ArtifactStream {
    fn drop(&mut self) {
        if self.input_name.is_none() && self.pending.is_empty() {
            return;
        }
        // best effort only: needs a live runtime to run the async deletes
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let engine = Arc::clone(&self.engine);
        let mut names: Vec<String> = self.pending.drain(..).collect();
        names.extend(self.input_name.take());
        handle.spawn(async move {
            for name in names {
                if let Err(e) = engine.delete_file(&name).await {
                    warn!(%name, error = %e, "Could not clean up workspace file");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    /// In-memory engine that fakes ffmpeg output for a source of known length
    struct FakeEngine {
        files: Mutex<BTreeMap<String, Vec<u8>>>,
        duration_seconds: u32,
        fail_exec: bool,
    }

    impl FakeEngine {
        fn new(duration_seconds: u32) -> Self {
            Self {
                files: Mutex::new(BTreeMap::new()),
                duration_seconds,
                fail_exec: false,
            }
        }

        fn names(&self) -> Vec<String> {
            self.files.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl TranscodeEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
            self.files.lock().unwrap().insert(name.to_string(), data.to_vec());
            Ok(())
        }

        async fn exec(&self, args: &[String], reporter: &Reporter) -> Result<(), EngineError> {
            if self.fail_exec {
                return Err(EngineError::CommandFailed {
                    code: Some(1),
                    stderr: "Invalid data found when processing input".into(),
                });
            }
            let mut files = self.files.lock().unwrap();
            if let Some(pos) = args.iter().position(|a| a == "-segment_time") {
                let step: u32 = args[pos + 1].parse().unwrap();
                let count = self.duration_seconds.div_ceil(step);
                for i in 0..count {
                    files.insert(format!("output_{:03}.mp4", i), vec![i as u8; 4]);
                }
            } else {
                for i in 1..=self.duration_seconds {
                    files.insert(format!("frame_{:04}.png", i), vec![i as u8; 2]);
                }
            }
            reporter.progress(100);
            Ok(())
        }

        async fn list_dir(&self) -> Result<Vec<String>, EngineError> {
            Ok(self.names())
        }

        async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
            self.files
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::Workspace(format!("no such file: {}", name)))
        }

        async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
            self.files.lock().unwrap().remove(name);
            Ok(())
        }
    }

    fn source() -> MediaFile {
        MediaFile::new("clip.mp4", vec![0u8; 2048])
    }

    async fn drain(stream: &mut ArtifactStream) -> Vec<GeneratedArtifact> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.unwrap());
        }
        out
    }

    #[test]
    fn test_segment_command() {
        let args = TranscodePipeline::command_for(&ProcessingMode::CutSegments { segment_seconds: 5 });
        assert_eq!(
            args.join(" "),
            "-i input.mp4 -c copy -map 0 -segment_time 5 -f segment -reset_timestamps 1 output_%03d.mp4"
        );
    }

    #[test]
    fn test_frame_command() {
        let args = TranscodePipeline::command_for(&ProcessingMode::ExtractFrames);
        assert_eq!(args.join(" "), "-i input.mp4 -vf fps=1 frame_%04d.png");
    }

    #[tokio::test]
    async fn test_segments_stream_in_order_and_clean_up() {
        let engine = Arc::new(FakeEngine::new(12));
        let pipeline = TranscodePipeline::new(engine.clone());

        let mut stream = pipeline
            .run(ProcessingMode::CutSegments { segment_seconds: 5 }, &source(), &Reporter::silent())
            .await
            .unwrap();
        assert_eq!(stream.remaining(), 3);

        let artifacts = drain(&mut stream).await;
        let names: Vec<_> = artifacts.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, ["output_000.mp4", "output_001.mp4", "output_002.mp4"]);
        assert!(artifacts.iter().all(|a| a.mime_type == "video/mp4"));
        assert!(engine.names().is_empty());
    }

    #[tokio::test]
    async fn test_frames_one_per_second() {
        let engine = Arc::new(FakeEngine::new(12));
        let pipeline = TranscodePipeline::new(engine.clone());

        let mut stream = pipeline
            .run(ProcessingMode::ExtractFrames, &source(), &Reporter::silent())
            .await
            .unwrap();
        let artifacts = drain(&mut stream).await;
        assert_eq!(artifacts.len(), 12);
        assert_eq!(artifacts[0].filename, "frame_0001.png");
        assert_eq!(artifacts[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_input_stays_until_stream_exhausted() {
        let engine = Arc::new(FakeEngine::new(3));
        let pipeline = TranscodePipeline::new(engine.clone());

        let mut stream = pipeline
            .run(ProcessingMode::ExtractFrames, &source(), &Reporter::silent())
            .await
            .unwrap();
        stream.next().await.unwrap().unwrap();
        assert!(engine.names().contains(&INPUT_FILE_NAME.to_string()));
        assert!(!engine.names().contains(&"frame_0001.png".to_string()));

        stream.finish().await.unwrap();
        assert!(engine.names().is_empty());
    }

    #[tokio::test]
    async fn test_exec_failure_releases_input() {
        let mut fake = FakeEngine::new(3);
        fake.fail_exec = true;
        let engine = Arc::new(fake);
        let pipeline = TranscodePipeline::new(engine.clone());

        let result = pipeline
            .run(ProcessingMode::ExtractFrames, &source(), &Reporter::silent())
            .await;
        assert!(matches!(result, Err(EngineError::CommandFailed { .. })));
        assert!(engine.names().is_empty());
    }

    #[tokio::test]
    async fn test_stale_outputs_are_cleared() {
        let engine = Arc::new(FakeEngine::new(2));
        engine.write_file("frame_0099.png", b"old").await.unwrap();
        let pipeline = TranscodePipeline::new(engine.clone());

        let mut stream = pipeline
            .run(ProcessingMode::ExtractFrames, &source(), &Reporter::silent())
            .await
            .unwrap();
        assert_eq!(drain(&mut stream).await.len(), 2);
    }
}
