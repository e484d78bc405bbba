use super::*;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::{ConfigError, EngineError, ResolutionError};
use crate::output::{GoogleConfig, LocalDirectory};
use crate::ports::{DownloadHost, EngineLoader, TranscodeEngine};

struct CountingLoader {
    loads: AtomicUsize,
}

#[async_trait]
impl EngineLoader for CountingLoader {
    async fn load(&self) -> Result<Arc<dyn TranscodeEngine>, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Err(EngineError::Unavailable("not in unit tests".into()))
    }
}

struct UnusedResolver;

#[async_trait]
impl MediaResolver for UnusedResolver {
    async fn resolve(&self, raw_url: &str, _: &Reporter) -> Result<MediaFile, ResolutionError> {
        Err(ResolutionError::new(format!("unexpected resolve of {}", raw_url)))
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
struct StateRecorder {
    states: Mutex<Vec<SessionState>>,
}

impl SessionObserver for StateRecorder {
    fn on_state(&self, state: SessionState) {
        self.states.lock().unwrap().push(state);
    }
    fn on_progress(&self, _: u8) {}
    fn on_log(&self, _: &LogMessage) {}
}

fn session() -> (SessionOrchestrator, Arc<CountingLoader>, Arc<StateRecorder>) {
    let loader = Arc::new(CountingLoader {
        loads: AtomicUsize::new(0),
    });
    let observer = Arc::new(StateRecorder::default());
    let sinks = SinkEnvironment {
        download_host: Arc::new(NullHost),
        http: reqwest::Client::new(),
        google: GoogleConfig::default(),
        access_token: None,
    };
    let session = SessionOrchestrator::new(
        Arc::new(EngineSlot::new(loader.clone())),
        Arc::new(UnusedResolver),
        sinks,
        observer.clone(),
    );
    (session, loader, observer)
}

fn small_file() -> MediaSource {
    MediaSource::File(MediaFile::new("clip.mp4", vec![0; 4096]))
}

#[tokio::test]
async fn test_missing_source_fails_before_engine_load() {
    let (mut session, loader, observer) = session();
    session.set_sink(OutputSink::ForcedDownload);

    let err = session.run().await.unwrap_err();
    assert!(matches!(err, FramecutError::Session(SessionError::NoMediaSource)));
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    assert_eq!(
        *observer.states.lock().unwrap(),
        vec![SessionState::Validating, SessionState::Error]
    );
}

#[tokio::test]
async fn test_missing_sink_is_rejected() {
    let (mut session, _, _) = session();
    session.set_source(small_file());

    let err = session.run().await.unwrap_err();
    assert!(matches!(err, FramecutError::Session(SessionError::NoOutputSink)));
}

#[tokio::test]
async fn test_non_positive_segment_length_is_rejected() {
    let (mut session, loader, _) = session();
    session.set_source(small_file());
    session.set_sink(OutputSink::ForcedDownload);
    session.set_mode(ProcessingMode::CutSegments { segment_seconds: 0 });

    let err = session.run().await.unwrap_err();
    assert!(matches!(
        err,
        FramecutError::Session(SessionError::InvalidSegmentLength(0))
    ));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_video_file_is_rejected_before_engine_load() {
    let (mut session, loader, observer) = session();
    session.set_source(MediaSource::File(MediaFile::new("notes.txt", vec![0; 4096])));
    session.set_sink(OutputSink::ForcedDownload);

    let err = session.run().await.unwrap_err();
    assert!(matches!(
        err,
        FramecutError::Session(SessionError::NotAVideo(ref name)) if name == "notes.txt"
    ));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    assert!(!observer
        .states
        .lock()
        .unwrap()
        .contains(&SessionState::LoadingEngine));
    assert_eq!(session.log().last().unwrap().text, "notes.txt is not a video file");
}

#[tokio::test]
async fn test_reset_is_a_no_op_when_idle() {
    let (mut session, _, observer) = session();
    session.set_source(small_file());

    session.reset();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(observer.states.lock().unwrap().is_empty());
    assert!(session.source().is_some());
}

#[tokio::test]
async fn test_remote_folder_needs_credentials() {
    let (mut session, _, _) = session();
    session.set_source(small_file());
    session.set_sink(OutputSink::RemoteFolder {
        folder_id: "1AbCdEfGh".into(),
    });

    let err = session.run().await.unwrap_err();
    assert!(matches!(
        err,
        FramecutError::Session(SessionError::Config(ConfigError::MissingCredential(_)))
    ));
}

#[tokio::test]
async fn test_engine_failure_lands_in_error_and_can_retry() {
    let (mut session, loader, _) = session();
    let dir = tempfile::TempDir::new().unwrap();
    session.set_source(small_file());
    session.set_sink(OutputSink::LocalDirectory(LocalDirectory::open(dir.path()).unwrap()));

    assert!(matches!(session.run().await, Err(FramecutError::Engine(_))));
    assert_eq!(session.state(), SessionState::Error);
    assert!(session.source().is_some());

    // Error accepts a new run, and a failed load is attempted again
    assert!(session.run().await.is_err());
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failure_log_carries_category_hint() {
    let (mut session, _, _) = session();
    session.fail(&FramecutError::from(ResolutionError::new(
        "allorigins: HTTP error 403 Forbidden",
    )));

    let last = session.log().last().unwrap();
    assert_eq!(last.kind, LogKind::Error);
    assert!(last.text.contains("access restriction"));
}

#[test]
fn test_log_ids_increase() {
    let (mut session, _, _) = session();
    session.info("one");
    session.warn("two");
    let ids: Vec<u64> = session.log().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2]);
}
