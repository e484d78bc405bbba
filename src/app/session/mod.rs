// Session orchestrator - Owns the user's choices and drives one run at a time

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::domain::errors::SessionError;
use crate::domain::model::*;
use crate::domain::rules::{category_hint, is_video_filename};
use crate::engine::progress::{ProgressEvent, Reporter};
use crate::engine::{EngineSlot, TranscodePipeline};
use crate::error::{FramecutError, FramecutResult};
use crate::output::{OutputDispatcher, OutputSink, SinkEnvironment};
use crate::ports::{ArtifactSink, MediaResolver, SessionObserver};
use crate::utils::Utils;

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: ProcessingMode,
    /// Artifacts the engine produced
    pub produced: usize,
    /// Artifacts the sink accepted
    pub dispatched: usize,
    pub failed: usize,
}

/// Inputs checked during validation
struct RunPlan {
    mode: ProcessingMode,
    sink: Arc<dyn ArtifactSink>,
}

/// Single-user session: selected source, mode and sink, progress and log.
///
/// Only one run or resolution can be in flight; the state gate rejects
/// the rest with [`SessionError::Busy`].
pub struct SessionOrchestrator {
    state: SessionState,
    source: Option<MediaSource>,
    mode: ProcessingMode,
    sink: Option<OutputSink>,
    progress: RunProgress,
    log: Vec<LogMessage>,
    next_log_id: u64,
    engine: Arc<EngineSlot>,
    resolver: Arc<dyn MediaResolver>,
    sinks: SinkEnvironment,
    observer: Arc<dyn SessionObserver>,
}

impl SessionOrchestrator {
    pub fn new(
        engine: Arc<EngineSlot>,
        resolver: Arc<dyn MediaResolver>,
        sinks: SinkEnvironment,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            source: None,
            mode: ProcessingMode::ExtractFrames,
            sink: None,
            progress: RunProgress::default(),
            log: Vec::new(),
            next_log_id: 1,
            engine,
            resolver,
            sinks,
            observer,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress.value()
    }

    pub fn log(&self) -> &[LogMessage] {
        &self.log
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref()
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn sink(&self) -> Option<&OutputSink> {
        self.sink.as_ref()
    }

    pub fn engine_loaded(&self) -> bool {
        self.engine.is_loaded()
    }

    pub fn set_source(&mut self, source: MediaSource) {
        self.info(format!("Selected video: {}", source.describe()));
        self.source = Some(source);
    }

    pub fn set_mode(&mut self, mode: ProcessingMode) {
        self.mode = mode;
    }

    pub fn set_sink(&mut self, sink: OutputSink) {
        self.info(format!("Output: {}", sink.label()));
        self.sink = Some(sink);
    }

    /// Resolve a link source into an in-memory file ahead of a run.
    ///
    /// A source that is already a file is left alone.
    pub async fn resolve_input(&mut self) -> FramecutResult<()> {
        self.ensure_ready()?;

        let raw = match &self.source {
            Some(MediaSource::Url(raw)) => raw.clone(),
            Some(MediaSource::File(_)) => return Ok(()),
            None => {
                let err = FramecutError::from(SessionError::NoMediaSource);
                self.fail(&err);
                return Err(err);
            }
        };

        let (reporter, mut events) = Reporter::channel();
        self.set_state(SessionState::ResolvingInput);
        self.info("Downloading video from link...");

        let resolver = Arc::clone(&self.resolver);
        let resolved = self
            .drive(&mut events, async move { resolver.resolve(&raw, &reporter).await })
            .await;

        match resolved {
            Ok(file) => {
                self.success(format!(
                    "Video ready: {} ({})",
                    file.name,
                    Utils::format_file_size(file.size() as u64)
                ));
                self.source = Some(MediaSource::File(file));
                self.set_state(SessionState::Idle);
                Ok(())
            }
            Err(e) => {
                let err = FramecutError::from(e);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Validate the session, then transcode and dispatch every artifact
    pub async fn run(&mut self) -> FramecutResult<RunSummary> {
        self.ensure_ready()?;

        self.progress.reset();
        self.observer.on_progress(0);
        self.set_state(SessionState::Validating);

        let plan = match self.validate() {
            Ok(plan) => plan,
            Err(e) => {
                let err = FramecutError::from(e);
                self.fail(&err);
                return Err(err);
            }
        };

        match self.execute(plan).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Return to `Idle` after a run whose future was dropped mid-flight.
    ///
    /// Runs borrow the session mutably, so a busy state seen here can only
    /// belong to an abandoned run. Source, mode, sink and log are kept.
    pub fn reset(&mut self) {
        if self.state.accepts_new_run() {
            return;
        }
        self.warn(format!("Previous run was interrupted while {}", self.state));
        self.progress.reset();
        self.set_state(SessionState::Idle);
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.state.accepts_new_run() {
            Ok(())
        } else {
            Err(SessionError::Busy(self.state))
        }
    }

    fn validate(&self) -> Result<RunPlan, SessionError> {
        match &self.source {
            None => return Err(SessionError::NoMediaSource),
            Some(MediaSource::File(file)) if !is_video_filename(&file.name) => {
                return Err(SessionError::NotAVideo(file.name.clone()));
            }
            Some(_) => {}
        }
        let sink = self.sink.as_ref().ok_or(SessionError::NoOutputSink)?;
        if let ProcessingMode::CutSegments { segment_seconds } = self.mode {
            if segment_seconds <= 0 {
                return Err(SessionError::InvalidSegmentLength(segment_seconds));
            }
        }
        let sink = self.sinks.build(sink)?;
        Ok(RunPlan {
            mode: self.mode,
            sink,
        })
    }

    async fn execute(&mut self, plan: RunPlan) -> FramecutResult<RunSummary> {
        let (reporter, mut events) = Reporter::channel();

        self.set_state(SessionState::LoadingEngine);
        if !self.engine.is_loaded() {
            self.info("Loading processing engine...");
        }
        let slot = Arc::clone(&self.engine);
        let engine = self
            .drive(&mut events, async move { slot.get_or_load().await })
            .await?;

        // the source stays in place so an interrupted run never loses it
        let pending_url = match &self.source {
            Some(MediaSource::Url(raw)) => Some(raw.clone()),
            Some(MediaSource::File(_)) => None,
            None => return Err(SessionError::NoMediaSource.into()),
        };
        if let Some(url) = pending_url {
            self.set_state(SessionState::ResolvingInput);
            let resolver = Arc::clone(&self.resolver);
            let task_reporter = reporter.clone();
            let file = self
                .drive(&mut events, async move {
                    resolver.resolve(&url, &task_reporter).await
                })
                .await?;
            self.success(format!(
                "Video ready: {} ({})",
                file.name,
                Utils::format_file_size(file.size() as u64)
            ));
            self.source = Some(MediaSource::File(file));
        }

        let file = match &self.source {
            Some(MediaSource::File(file)) => file.clone(),
            _ => return Err(SessionError::NoMediaSource.into()),
        };
        let pipeline = TranscodePipeline::new(engine);
        self.transcode_and_dispatch(&pipeline, &file, plan, &reporter, &mut events)
            .await
    }

    async fn transcode_and_dispatch(
        &mut self,
        pipeline: &TranscodePipeline,
        file: &MediaFile,
        plan: RunPlan,
        reporter: &Reporter,
        events: &mut UnboundedReceiver<ProgressEvent>,
    ) -> FramecutResult<RunSummary> {
        let mode = plan.mode;
        self.set_state(SessionState::Transcoding);
        let mut stream = self
            .drive(events, pipeline.run(mode, file, reporter))
            .await?;

        self.set_state(SessionState::Dispatching);
        let mut dispatcher = OutputDispatcher::new(plan.sink);
        let produced = stream.remaining();
        if produced == 0 {
            self.warn("The engine produced no output files");
        } else {
            self.info(format!(
                "Generated {} {}(s), saving to {}",
                produced,
                mode.artifact_noun(),
                dispatcher.describe()
            ));
        }

        while let Some(item) = self.drive(events, stream.next()).await {
            let artifact = item?;
            match self.drive(events, dispatcher.dispatch(&artifact)).await {
                Ok(()) => self.success(format!("Saved {}", artifact.filename)),
                Err(e) => self.error(e.to_string()),
            }
        }

        self.progress.complete();
        self.observer.on_progress(self.progress.value());
        self.success(format!("Completed: {} file(s) saved", dispatcher.dispatched()));
        self.set_state(SessionState::Completed);

        Ok(RunSummary {
            mode,
            produced,
            dispatched: dispatcher.dispatched(),
            failed: dispatcher.failed(),
        })
    }

    /// Await `task` while applying the progress and log events it emits
    async fn drive<T, F>(&mut self, events: &mut UnboundedReceiver<ProgressEvent>, task: F) -> T
    where
        F: Future<Output = T>,
    {
        tokio::pin!(task);
        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.apply(event),
                output = &mut task => {
                    while let Ok(event) = events.try_recv() {
                        self.apply(event);
                    }
                    return output;
                }
            }
        }
    }

    fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Progress(percent) => {
                if self.progress.advance(percent) {
                    self.observer.on_progress(self.progress.value());
                }
            }
            ProgressEvent::Log { kind, text } => self.push_log(kind, text),
        }
    }

    fn set_state(&mut self, state: SessionState) {
        debug!(from = %self.state, to = %state, "Session state");
        self.state = state;
        self.observer.on_state(state);
    }

    fn fail(&mut self, err: &FramecutError) {
        let message = err.to_string();
        let text = match category_hint(&message) {
            Some(hint) => format!("{} ({})", message, hint),
            None => message,
        };
        self.error(text);
        self.set_state(SessionState::Error);
    }

    fn info(&mut self, text: impl Into<String>) {
        self.push_log(LogKind::Info, text.into());
    }

    fn success(&mut self, text: impl Into<String>) {
        self.push_log(LogKind::Success, text.into());
    }

    fn warn(&mut self, text: impl Into<String>) {
        self.push_log(LogKind::Warning, text.into());
    }

    fn error(&mut self, text: impl Into<String>) {
        self.push_log(LogKind::Error, text.into());
    }

    fn push_log(&mut self, kind: LogKind, text: String) {
        match kind {
            LogKind::Info | LogKind::Success => info!("{}", text),
            LogKind::Warning => warn!("{}", text),
            LogKind::Error => error!("{}", text),
        }
        let message = LogMessage {
            id: self.next_log_id,
            text,
            timestamp: Utc::now(),
            kind,
        };
        self.next_log_id += 1;
        self.observer.on_log(&message);
        self.log.push(message);
    }
}

#[cfg(test)]
mod tests;
