//! Progress and log event plumbing between components and the session

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::domain::model::LogKind;

/// Event emitted by a component while it works
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Engine progress as an integer percentage
    Progress(u8),
    /// A line destined for the session log
    Log { kind: LogKind, text: String },
}

/// Cheap handle components use to report progress and log lines.
///
/// Events go to the owning session through a channel; a silent reporter
/// only writes to tracing.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl Reporter {
    /// Create a reporter together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn silent() -> Self {
        Self { sender: None }
    }

    pub fn progress(&self, percent: u8) {
        self.emit(ProgressEvent::Progress(percent.min(100)));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogKind::Info, text.into());
    }

    pub fn success(&self, text: impl Into<String>) {
        self.log(LogKind::Success, text.into());
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.log(LogKind::Warning, text.into());
    }

    fn log(&self, kind: LogKind, text: String) {
        if self.sender.is_none() {
            match kind {
                LogKind::Info | LogKind::Success => info!("{}", text),
                LogKind::Warning => warn!("{}", text),
                LogKind::Error => error!("{}", text),
            }
        }
        self.emit(ProgressEvent::Log { kind, text });
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            // receiver gone means the session stopped listening
            let _ = sender.send(event);
        }
    }
}

/// Turns ffmpeg `-progress pipe:1` key=value lines into percentages
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgressParser {
    duration_us: Option<u64>,
    last_percent: Option<u8>,
}

impl FfmpegProgressParser {
    /// Parser for a source of known duration. Without one only the final
    /// `progress=end` marker produces a value.
    pub fn new(duration_seconds: Option<f64>) -> Self {
        let duration_us = duration_seconds
            .filter(|d| d.is_finite())
            .map(|d| (d * 1_000_000.0) as u64)
            .filter(|us| *us > 0);
        Self {
            duration_us,
            last_percent: None,
        }
    }

    /// Feed one line; returns a percentage when it changed
    pub fn feed_line(&mut self, line: &str) -> Option<u8> {
        let (key, value) = line.trim().split_once('=')?;
        let percent = match key {
            // ffmpeg reports out_time_ms in microseconds as well
            "out_time_us" | "out_time_ms" => {
                let elapsed: u64 = value.trim().parse().ok()?;
                let total = self.duration_us?;
                ((elapsed.saturating_mul(100)) / total).min(100) as u8
            }
            "progress" if value.trim() == "end" => 100,
            _ => return None,
        };

        if self.last_percent == Some(percent) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(percent)
    }
}
