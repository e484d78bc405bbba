//! Session runs end to end over an in-memory engine

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use framecut::engine::progress::Reporter;
use framecut::engine::EngineSlot;
use framecut::output::{GoogleConfig, LocalDirectory, OutputSink, SinkEnvironment};
use framecut::ports::{DownloadHost, EngineLoader, MediaResolver, SessionObserver, TranscodeEngine};
use framecut::{
    EngineError, FramecutError, LogKind, LogMessage, MediaFile, MediaSource, ProcessingMode,
    ResolutionError, SessionError, SessionOrchestrator, SessionState,
};

/// Engine producing ffmpeg-shaped outputs for a source of fixed duration
struct ScriptedEngine {
    duration_seconds: u32,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

#[async_trait]
impl TranscodeEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.files.lock().unwrap().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn exec(&self, args: &[String], reporter: &Reporter) -> Result<(), EngineError> {
        let mut files = self.files.lock().unwrap();
        if let Some(pos) = args.iter().position(|a| a == "-segment_time") {
            let step: u32 = args[pos + 1].parse().unwrap();
            for i in 0..self.duration_seconds.div_ceil(step) {
                files.insert(format!("output_{:03}.mp4", i), vec![1; 16]);
            }
        } else {
            for i in 1..=self.duration_seconds {
                files.insert(format!("frame_{:04}.png", i), vec![2; 8]);
            }
        }
        reporter.progress(40);
        reporter.progress(30);
        reporter.progress(90);
        Ok(())
    }

    async fn list_dir(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.files.lock().unwrap().keys().cloned().collect())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::Workspace(format!("missing {}", name)))
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        self.files.lock().unwrap().remove(name);
        Ok(())
    }
}

struct ScriptedLoader {
    loads: AtomicUsize,
}

#[async_trait]
impl EngineLoader for ScriptedLoader {
    async fn load(&self) -> Result<Arc<dyn TranscodeEngine>, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedEngine {
            duration_seconds: 12,
            files: Mutex::new(BTreeMap::new()),
        }))
    }
}

/// Resolver serving a fixed file, or hanging forever
struct StaticResolver {
    hang: bool,
}

#[async_trait]
impl MediaResolver for StaticResolver {
    async fn resolve(&self, raw_url: &str, reporter: &Reporter) -> Result<MediaFile, ResolutionError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        reporter.info(format!("Resolving link: {}", raw_url));
        Ok(MediaFile::new("remote.mp4", vec![0; 4096]))
    }
}

struct NullHost;

#[async_trait]
impl DownloadHost for NullHost {
    async fn trigger_save(&self, _: &Path, filename: &str) -> Result<PathBuf, String> {
        Ok(PathBuf::from(filename))
    }
}

#[derive(Default)]
struct Recorder {
    states: Mutex<Vec<SessionState>>,
    progress: Mutex<Vec<u8>>,
}

impl SessionObserver for Recorder {
    fn on_state(&self, state: SessionState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_progress(&self, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }

    fn on_log(&self, _message: &LogMessage) {}
}

struct Harness {
    session: SessionOrchestrator,
    loader: Arc<ScriptedLoader>,
    recorder: Arc<Recorder>,
    out: TempDir,
}

fn harness(hang: bool) -> Harness {
    let loader = Arc::new(ScriptedLoader {
        loads: AtomicUsize::new(0),
    });
    let recorder = Arc::new(Recorder::default());
    let sinks = SinkEnvironment {
        download_host: Arc::new(NullHost),
        http: reqwest::Client::new(),
        google: GoogleConfig::default(),
        access_token: None,
    };
    let session = SessionOrchestrator::new(
        Arc::new(EngineSlot::new(loader.clone())),
        Arc::new(StaticResolver { hang }),
        sinks,
        recorder.clone(),
    );
    Harness {
        session,
        loader,
        recorder,
        out: TempDir::new().unwrap(),
    }
}

impl Harness {
    fn select_local_output(&mut self) {
        let dir = LocalDirectory::open(self.out.path()).unwrap();
        self.session.set_sink(OutputSink::LocalDirectory(dir));
    }

    fn saved_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| self.out.path().join(n).is_file())
            .collect();
        names.sort();
        names
    }
}

fn local_video() -> MediaSource {
    MediaSource::File(MediaFile::new("talk.mp4", vec![0; 4096]))
}

#[tokio::test]
async fn test_segments_of_five_seconds_on_twelve_second_source() {
    let mut h = harness(false);
    h.session.set_source(local_video());
    h.session.set_mode(ProcessingMode::CutSegments { segment_seconds: 5 });
    h.select_local_output();

    let summary = h.session.run().await.unwrap();

    assert_eq!(summary.produced, 3);
    assert_eq!(summary.dispatched, 3);
    assert_eq!(
        h.saved_files(),
        vec!["output_000.mp4", "output_001.mp4", "output_002.mp4"]
    );
    assert_eq!(h.session.state(), SessionState::Completed);
    assert_eq!(
        *h.recorder.states.lock().unwrap(),
        vec![
            SessionState::Validating,
            SessionState::LoadingEngine,
            SessionState::Transcoding,
            SessionState::Dispatching,
            SessionState::Completed,
        ]
    );
}

#[tokio::test]
async fn test_frames_one_per_second() {
    let mut h = harness(false);
    h.session.set_source(local_video());
    h.session.set_mode(ProcessingMode::ExtractFrames);
    h.select_local_output();

    let summary = h.session.run().await.unwrap();
    assert_eq!(summary.produced, 12);
    assert_eq!(h.saved_files().len(), 12);
    assert_eq!(h.saved_files()[0], "frame_0001.png");
}

#[tokio::test]
async fn test_one_failing_dispatch_does_not_stop_the_rest() {
    let mut h = harness(false);
    // a directory squatting on one output name makes that single write fail
    std::fs::create_dir(h.out.path().join("frame_0005.png")).unwrap();
    h.session.set_source(local_video());
    h.select_local_output();

    let summary = h.session.run().await.unwrap();

    assert_eq!(summary.produced, 12);
    assert_eq!(summary.dispatched, 11);
    assert_eq!(summary.failed, 1);
    assert_eq!(h.session.state(), SessionState::Completed);

    let log = h.session.log();
    assert!(log
        .iter()
        .any(|m| m.kind == LogKind::Error && m.text.contains("frame_0005.png")));
    assert_eq!(
        log.last().unwrap().text,
        "Completed: 11 file(s) saved"
    );
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_one_hundred() {
    let mut h = harness(false);
    h.session.set_source(local_video());
    h.select_local_output();

    h.session.run().await.unwrap();

    let progress = h.recorder.progress.lock().unwrap().clone();
    assert_eq!(progress, vec![0, 40, 90, 100]);
    assert_eq!(h.session.progress(), 100);
}

#[tokio::test]
async fn test_link_source_is_resolved_during_run() {
    let mut h = harness(false);
    h.session
        .set_source(MediaSource::Url("https://cdn.example.com/remote.mp4".into()));
    h.select_local_output();

    h.session.run().await.unwrap();

    assert!(h
        .recorder
        .states
        .lock()
        .unwrap()
        .contains(&SessionState::ResolvingInput));
    assert!(matches!(h.session.source(), Some(MediaSource::File(f)) if f.name == "remote.mp4"));
    assert!(h
        .session
        .log()
        .iter()
        .any(|m| m.text == "Resolving link: https://cdn.example.com/remote.mp4"));
}

#[tokio::test]
async fn test_resolve_input_replaces_link_with_file() {
    let mut h = harness(false);
    h.session
        .set_source(MediaSource::Url("https://cdn.example.com/remote.mp4".into()));

    h.session.resolve_input().await.unwrap();

    assert!(h.session.source().unwrap().is_resolved());
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_engine_is_loaded_once_per_session() {
    let mut h = harness(false);
    h.session.set_source(local_video());
    h.select_local_output();

    h.session.run().await.unwrap();
    h.session.set_mode(ProcessingMode::CutSegments { segment_seconds: 4 });
    let summary = h.session.run().await.unwrap();

    assert_eq!(summary.produced, 3);
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 1);
    assert!(h.session.engine_loaded());
}

#[tokio::test]
async fn test_abandoned_run_leaves_session_busy() {
    let mut h = harness(true);
    h.session
        .set_source(MediaSource::Url("https://cdn.example.com/slow.mp4".into()));
    h.select_local_output();

    let abandoned = tokio::time::timeout(Duration::from_millis(50), h.session.run()).await;
    assert!(abandoned.is_err());
    assert_eq!(h.session.state(), SessionState::ResolvingInput);

    let err = h.session.run().await.unwrap_err();
    assert!(matches!(
        err,
        FramecutError::Session(SessionError::Busy(SessionState::ResolvingInput))
    ));
    let err = h.session.resolve_input().await.unwrap_err();
    assert!(matches!(err, FramecutError::Session(SessionError::Busy(_))));
}

#[tokio::test]
async fn test_reset_after_abandoned_run_keeps_the_source() {
    let mut h = harness(true);
    h.session
        .set_source(MediaSource::Url("https://cdn.example.com/slow.mp4".into()));
    h.select_local_output();

    let abandoned = tokio::time::timeout(Duration::from_millis(50), h.session.run()).await;
    assert!(abandoned.is_err());
    assert!(matches!(
        h.session.source(),
        Some(MediaSource::Url(url)) if url == "https://cdn.example.com/slow.mp4"
    ));

    h.session.reset();

    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.session.progress(), 0);
    assert!(h
        .session
        .log()
        .iter()
        .any(|m| m.kind == LogKind::Warning && m.text.contains("interrupted while resolving input")));

    // a local file source runs to completion once the session is idle again
    h.session.set_source(local_video());
    let summary = h.session.run().await.unwrap();
    assert_eq!(summary.produced, 12);
}

#[tokio::test]
async fn test_missing_source_never_loads_engine() {
    let mut h = harness(false);
    h.select_local_output();

    let err = h.session.run().await.unwrap_err();

    assert!(matches!(err, FramecutError::Session(SessionError::NoMediaSource)));
    assert_eq!(h.session.state(), SessionState::Error);
    assert!(!h
        .recorder
        .states
        .lock()
        .unwrap()
        .contains(&SessionState::LoadingEngine));
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 0);
}
