//! Connection lifetime tests

use super::*;
use pawgate_core::camera::CAMERA_UNAVAILABLE;
use pawgate_core::display::{self, DEGRADED_BANNER};
use pawgate_core::model::{DoorMode, SensorOverride};
use pawgate_core::{SessionError, StillImageCamera};
use std::io::Write;

#[tokio::test]
async fn test_connect_failure_stays_disconnected() {
    let backend = RecordingBackend::new();
    backend.fail_fetch.store(true, Ordering::SeqCst);
    let mut session = session(&backend, &CannedVision::new("unused"));

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, SessionError::Connect(_)));
    assert!(!session.is_connected());
    assert!(!session.is_polling());
    assert_eq!(
        session.store().read(|s| s.last_log.clone()),
        "[ERR] Could not connect to Pi. Is the Python script running?"
    );

    settle().await;
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_connect_replaces_config_and_resets_simulation() {
    let backend = RecordingBackend::new();
    {
        let mut remote = backend.config.lock().unwrap();
        remote.door_mode = DoorMode::Manual;
        remote.hold_open_time = 4.0;
    }
    let mut session = session(&backend, &CannedVision::new("unused"));

    // offline edits are kept locally and replaced on connect
    session.config().set_motor_speed(5).unwrap();
    assert_eq!(session.store().read(|s| s.config.motor_speed), 5);

    session.connect().await.unwrap();
    let s = session.store().snapshot();
    assert!(s.connected);
    assert_eq!(s.config.door_mode, DoorMode::Manual);
    assert_eq!(s.config.hold_open_time, 4.0);
    assert_eq!(s.config.motor_speed, 3);
    assert_eq!(s.last_log, "[INFO] Connected to Raspberry Pi Backend");

    session.simulation().toggle_enabled().unwrap().await.unwrap();
    session.disconnect();
    session.connect().await.unwrap();
    assert!(!session.simulation().current().enabled);
}

#[tokio::test]
async fn test_open_countdown_renders_remaining_hold_time() {
    let backend = RecordingBackend::new();
    backend.set_status(SystemState::Open, 3.0);
    let mut session = session(&backend, &CannedVision::new("unused"));
    session.connect().await.unwrap();
    settle().await;

    let s = session.store().snapshot();
    assert_eq!(s.system_state(), SystemState::Open);
    assert_eq!(
        display::info_line(s.system_state(), s.status.elapsed_time, s.config.hold_open_time),
        "Closing in: 7.0s"
    );
    assert!(display::render(&s).contains("Closing in: 7.0s"));
}

#[tokio::test]
async fn test_degraded_banner_appears_and_clears() {
    let backend = RecordingBackend::new();
    let mut session = session(&backend, &CannedVision::new("unused"));
    session.connect().await.unwrap();
    settle().await;
    assert!(display::banners(&session.store().snapshot()).is_empty());

    backend.fail_status.store(true, Ordering::SeqCst);
    settle().await;
    let s = session.store().snapshot();
    assert!(s.degraded);
    assert_eq!(s.system_state(), SystemState::Closed);
    assert_eq!(display::banners(&s), vec![DEGRADED_BANNER]);

    // polling keeps going at the same interval while degraded
    let calls = backend.status_calls.load(Ordering::SeqCst);
    settle().await;
    assert!(backend.status_calls.load(Ordering::SeqCst) > calls);

    backend.fail_status.store(false, Ordering::SeqCst);
    backend.set_status(SystemState::Opening, 0.0);
    settle().await;
    let s = session.store().snapshot();
    assert!(!s.degraded);
    assert_eq!(s.system_state(), SystemState::Opening);
}

#[tokio::test]
async fn test_disconnect_stops_polling_and_clears_degraded() {
    let backend = RecordingBackend::new();
    backend.fail_status.store(true, Ordering::SeqCst);
    let mut session = session(&backend, &CannedVision::new("unused"));
    session.connect().await.unwrap();
    settle().await;
    assert!(session.store().read(|s| s.degraded));

    session.disconnect();
    assert!(!session.is_polling());
    let s = session.store().snapshot();
    assert!(!s.connected);
    assert!(!s.degraded);

    let calls = backend.status_calls.load(Ordering::SeqCst);
    settle().await;
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_offline_session_issues_no_requests() {
    let backend = RecordingBackend::new();
    let session = session(&backend, &CannedVision::new("unused"));

    assert!(session.simulation().toggle_enabled().is_none());
    assert!(session
        .simulation()
        .set_override(SensorOverride::Safety, true)
        .is_none());
    assert!(session.config().set_hold_open_time(12.0).unwrap().is_none());
    let _ = session.open().await;
    let _ = session.close().await;
    session.report_video_error();
    settle().await;

    assert_eq!(backend.request_count(), 0);
    let s = session.store().snapshot();
    assert_eq!(s.config.hold_open_time, 12.0);
    assert!(!s.video_error);
}

#[tokio::test]
async fn test_camera_lease_follows_connection() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
    let camera = Arc::new(StillImageCamera::new(file.path()));

    let backend = RecordingBackend::new();
    let mut session = session(&backend, &CannedVision::new("unused")).with_camera(camera.clone());
    assert!(session.has_camera());
    assert!(camera.is_open());

    session.connect().await.unwrap();
    assert!(!session.has_camera());
    assert!(!camera.is_open());

    session.disconnect();
    assert!(session.has_camera());
    assert!(camera.is_open());

    drop(session);
    assert!(!camera.is_open());
}

#[tokio::test]
async fn test_missing_camera_shows_inline_message() {
    let backend = RecordingBackend::new();
    let camera = Arc::new(StillImageCamera::new("/nonexistent/pawgate.jpg"));
    let session = session(&backend, &CannedVision::new("unused")).with_camera(camera);

    assert!(!session.has_camera());
    assert_eq!(
        session.store().read(|s| s.camera_message.clone()).as_deref(),
        Some(CAMERA_UNAVAILABLE)
    );
}

#[tokio::test]
async fn test_video_error_is_reset_on_reconnect() {
    let backend = RecordingBackend::new();
    let mut session = session(&backend, &CannedVision::new("unused"));
    session.connect().await.unwrap();
    session.report_video_error();
    assert!(session.store().read(|s| s.video_error));

    session.disconnect();
    session.connect().await.unwrap();
    assert!(!session.store().read(|s| s.video_error));
    assert_eq!(session.video_feed_url(), "http://fake/video_feed");
}
