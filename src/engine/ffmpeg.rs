//! ffmpeg subprocess engine working inside a private temporary workspace

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::errors::EngineError;
use crate::engine::progress::{FfmpegProgressParser, Reporter};
use crate::engine::EngineConfig;
use crate::ports::{EngineLoader, TranscodeEngine};

/// Engine backed by the `ffmpeg` executable.
///
/// The temporary workspace plays the role of the engine's virtual
/// filesystem and is removed when the engine is dropped.
pub struct FfmpegEngine {
    config: EngineConfig,
    workspace: TempDir,
}

impl FfmpegEngine {
    /// Verify the executable and create the workspace
    pub async fn load(config: EngineConfig) -> Result<Self, EngineError> {
        let output = Command::new(&config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                EngineError::Unavailable(format!("cannot run {}: {}", config.ffmpeg_path, e))
            })?;

        if !output.status.success() {
            return Err(EngineError::Unavailable(format!(
                "{} -version exited with {}",
                config.ffmpeg_path, output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("ffmpeg")
            .to_string();

        let workspace = tempfile::Builder::new()
            .prefix("framecut-")
            .tempdir()
            .map_err(|e| EngineError::Workspace(format!("cannot create workspace: {}", e)))?;

        info!(%version, workspace = %workspace.path().display(), "ffmpeg engine loaded");
        Ok(Self { config, workspace })
    }

    /// Map a workspace file name to a path, refusing anything that escapes it
    fn path_for(&self, name: &str) -> Result<PathBuf, EngineError> {
        let invalid = name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name == "."
            || name == "..";
        if invalid {
            return Err(EngineError::Workspace(format!("invalid file name: {:?}", name)));
        }
        Ok(self.workspace.path().join(name))
    }

    /// Duration of a staged input in seconds, when ffprobe can tell
    async fn probe_duration(&self, input: &Path) -> Option<f64> {
        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout).trim().parse().ok()
    }

    /// Input file referenced by `-i` in a command, if any
    fn input_of(args: &[String]) -> Option<&str> {
        args.windows(2)
            .find(|pair| pair[0] == "-i")
            .map(|pair| pair[1].as_str())
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| EngineError::Workspace(format!("cannot write {}: {}", name, e)))
    }

    async fn exec(&self, args: &[String], reporter: &Reporter) -> Result<(), EngineError> {
        let duration = match Self::input_of(args) {
            Some(input) => self.probe_duration(&self.path_for(input)?).await,
            None => None,
        };
        debug!(?duration, ?args, "Running ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(["-hide_banner", "-y", "-nostats", "-progress", "pipe:1"])
            .arg("-threads")
            .arg(self.config.threads.max(1).to_string())
            .args(args)
            .current_dir(self.workspace.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("cannot start ffmpeg: {}", e)))?;

        // drain stderr concurrently so a chatty ffmpeg never blocks on a full pipe
        let tail_lines = self.config.stderr_tail_lines;
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut tail = VecDeque::with_capacity(tail_lines);
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == tail_lines {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Vec::from(tail).join("\n")
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut parser = FfmpegProgressParser::new(duration);
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(percent) = parser.feed_line(&line) {
                    reporter.progress(percent);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Unavailable(format!("ffmpeg did not finish: {}", e)))?;

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            warn!(code = ?status.code(), "ffmpeg command failed");
            return Err(EngineError::CommandFailed {
                code: status.code(),
                stderr,
            });
        }
        Ok(())
    }

    async fn list_dir(&self) -> Result<Vec<String>, EngineError> {
        let mut names = Vec::new();
        for entry in WalkDir::new(self.workspace.path()).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| EngineError::Workspace(format!("cannot list workspace: {}", e)))?;
            if entry.file_type().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.path_for(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| EngineError::Workspace(format!("cannot read {}: {}", name, e)))
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| EngineError::Workspace(format!("cannot delete {}: {}", name, e)))
    }
}

/// Loads [`FfmpegEngine`] instances for an [`EngineSlot`](crate::engine::EngineSlot)
pub struct FfmpegLoader {
    config: EngineConfig,
}

impl FfmpegLoader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineLoader for FfmpegLoader {
    async fn load(&self) -> Result<Arc<dyn TranscodeEngine>, EngineError> {
        let engine = FfmpegEngine::load(self.config.clone()).await?;
        Ok(Arc::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_of_finds_input_argument() {
        let args: Vec<String> = ["-i", "input.mp4", "-vf", "fps=1", "frame_%04d.png"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(FfmpegEngine::input_of(&args), Some("input.mp4"));
        assert_eq!(FfmpegEngine::input_of(&[]), None);
    }

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let config = EngineConfig {
            ffmpeg_path: "/nonexistent/framecut-ffmpeg".to_string(),
            ..EngineConfig::default()
        };
        let err = FfmpegEngine::load(config).await.err().unwrap();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }
}
