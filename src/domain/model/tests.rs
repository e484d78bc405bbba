// Unit tests for domain models

use super::*;

#[test]
fn test_run_progress_is_monotonic() {
    let mut progress = RunProgress::default();
    assert!(progress.advance(40));
    assert!(!progress.advance(10));
    assert_eq!(progress.value(), 40);
    assert!(progress.advance(250));
    assert_eq!(progress.value(), 100);
}

#[test]
fn test_run_progress_reset_and_complete() {
    let mut progress = RunProgress::default();
    progress.advance(70);
    progress.reset();
    assert_eq!(progress.value(), 0);
    progress.complete();
    assert_eq!(progress.value(), 100);
}

#[test]
fn test_processing_mode_output_matching() {
    let frames = ProcessingMode::ExtractFrames;
    assert!(frames.matches_output("frame_0001.png"));
    assert!(!frames.matches_output("output_000.mp4"));
    assert!(!frames.matches_output("input.mp4"));

    let segments = ProcessingMode::CutSegments { segment_seconds: 5 };
    assert!(segments.matches_output("output_000.mp4"));
    assert!(!segments.matches_output("output_000.png"));
    assert_eq!(segments.mime_type(), "video/mp4");
    assert_eq!(frames.mime_type(), "image/png");
}

#[test]
fn test_session_state_run_gate() {
    assert!(SessionState::Idle.accepts_new_run());
    assert!(SessionState::Completed.accepts_new_run());
    assert!(SessionState::Error.accepts_new_run());
    assert!(!SessionState::LoadingEngine.accepts_new_run());
    assert!(!SessionState::ResolvingInput.accepts_new_run());
    assert!(!SessionState::Transcoding.accepts_new_run());
    assert!(!SessionState::Dispatching.accepts_new_run());
}

#[test]
fn test_media_debug_hides_payload() {
    let file = MediaFile::new("clip.mp4", vec![0u8; 4096]);
    let rendered = format!("{:?}", file);
    assert!(rendered.contains("clip.mp4"));
    assert!(rendered.contains("4096"));
    assert!(!MediaSource::Url("https://example.com/v.mp4".into()).is_resolved());
    assert!(MediaSource::File(file).is_resolved());
}
