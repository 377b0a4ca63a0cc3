//! Vision analysis through the session

use super::*;
use pawgate_core::vision::{ANALYSIS_PROMPT, NO_IMAGE};
use pawgate_core::StillImageCamera;
use std::io::Write;

#[tokio::test]
async fn test_connected_analysis_uses_controller_snapshot() {
    let backend = RecordingBackend::new();
    backend.config.lock().unwrap().gemini_api_key = Some("pi-key".to_string());
    *backend.snapshot.lock().unwrap() = b"ABC".to_vec();
    let vision = CannedVision::new("A dog is sitting by the door.");
    let mut session = session(&backend, &vision);
    session.connect().await.unwrap();

    let text = session.analyze().await;
    assert_eq!(text.as_deref(), Some("A dog is sitting by the door."));

    let seen = vision.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].image_base64, "QUJD");
    assert_eq!(seen[0].instruction, ANALYSIS_PROMPT);
    assert_eq!(seen[0].api_key.as_deref(), Some("pi-key"));

    let s = session.store().snapshot();
    assert!(!s.analyzing);
    assert_eq!(s.analysis.unwrap().text, "A dog is sitting by the door.");
    assert_eq!(s.last_log, "[AI] Analysis received");
}

#[tokio::test]
async fn test_failed_snapshot_reports_no_image_and_releases_latch() {
    let backend = RecordingBackend::new();
    backend.fail_snapshot.store(true, Ordering::SeqCst);
    let vision = CannedVision::new("unused");
    let mut session = session(&backend, &vision);
    session.connect().await.unwrap();

    assert_eq!(session.analyze().await.as_deref(), Some(NO_IMAGE));
    assert!(vision.seen.lock().unwrap().is_empty());
    let s = session.store().snapshot();
    assert!(!s.analyzing);
    assert_eq!(s.analysis.unwrap().text, NO_IMAGE);

    // a later analysis is accepted once the controller serves frames again
    backend.fail_snapshot.store(false, Ordering::SeqCst);
    assert_eq!(session.analyze().await.as_deref(), Some("unused"));
}

#[tokio::test]
async fn test_offline_analysis_uses_local_camera() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"ABC").unwrap();
    let backend = RecordingBackend::new();
    let vision = CannedVision::new("Area is empty.");
    let session = session(&backend, &vision).with_camera(Arc::new(StillImageCamera::new(file.path())));

    assert_eq!(session.analyze().await.as_deref(), Some("Area is empty."));
    assert_eq!(vision.seen.lock().unwrap()[0].image_base64, "QUJD");
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn test_offline_analysis_without_camera_reports_no_image() {
    let backend = RecordingBackend::new();
    let vision = CannedVision::new("unused");
    let session = session(&backend, &vision);

    assert_eq!(session.analyze().await.as_deref(), Some(NO_IMAGE));
    assert!(vision.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_second_analysis_is_dropped_while_first_is_pending() {
    let backend = RecordingBackend::new();
    let vision = CannedVision::slow("Dog waiting.", Duration::from_millis(100));
    let mut session = session(&backend, &vision);
    session.connect().await.unwrap();

    let (first, second) = tokio::join!(session.analyze(), session.analyze());
    assert_eq!(first.as_deref(), Some("Dog waiting."));
    assert_eq!(second, None);
    assert_eq!(vision.seen.lock().unwrap().len(), 1);

    // latch released
    assert!(session.analyze().await.is_some());
}
