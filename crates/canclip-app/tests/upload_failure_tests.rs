//! Integration tests for failed uploads surfacing through the engine.

mod common;

use canclip_app::AppError;
use canclip_capture::SessionState;
use canclip_transfer::{FailureClass, TransferError, classify_transfer_error};

#[tokio::test]
async fn upload_failure_tests_chunk_rejection_is_restart_required() {
    let fixture = common::fixture_engine();
    fixture.engine.login().await.expect("login should succeed");
    common::record(&fixture, &[vec![1_u8; 3_000].as_slice()]).await;
    fixture.backend.reject_chunk(1, "quota exceeded");

    let error = fixture
        .engine
        .upload_pending(|_| {})
        .await
        .expect_err("rejected chunk should fail the upload");

    let transfer = match error {
        AppError::Transfer(transfer) => transfer,
        other => panic!("unexpected error: {other}"),
    };
    assert!(matches!(transfer, TransferError::ChunkTransfer { index: 1, .. }));
    assert_eq!(classify_transfer_error(&transfer), FailureClass::RestartRequired);
}

#[tokio::test]
async fn upload_failure_tests_retry_with_kept_recording() {
    let fixture = common::fixture_engine();
    fixture.engine.login().await.expect("login should succeed");
    common::record(&fixture, &[vec![5_u8; 1_500].as_slice()]).await;
    let recording = fixture
        .engine
        .capture()
        .take_recording()
        .await
        .expect("recording should be pending");
    fixture.backend.reject_init("busy");

    assert!(fixture.engine.upload_recording(&recording, |_| {}).await.is_err());

    fixture.backend.clear_faults();
    let report = fixture
        .engine
        .upload_recording(&recording, |_| {})
        .await
        .expect("second attempt should succeed");
    assert_eq!(fixture.backend.stored_payload(&report.media_id), Some(recording.payload));
}

#[tokio::test]
async fn upload_failure_tests_refused_session_keeps_recording_pending() {
    let fixture = common::fixture_engine();
    fixture.engine.login().await.expect("login should succeed");
    let recorded = common::record(&fixture, &[b"first-".as_slice(), b"second".as_slice()]).await;
    assert_eq!(recorded, 12);
    fixture.backend.reject_init("busy");

    let error = fixture
        .engine
        .upload_pending(|_| {})
        .await
        .expect_err("refused session should fail the upload");
    assert!(matches!(
        error,
        AppError::Transfer(TransferError::SessionOpen { ref reason }) if reason == "busy"
    ));
    let capture = fixture.engine.capture();
    assert_eq!(capture.state().await, SessionState::StoppedPendingDecision);

    fixture.backend.clear_faults();
    let report = fixture
        .engine
        .upload_pending(|_| {})
        .await
        .expect("retry should upload the kept recording");
    assert_eq!(
        fixture.backend.stored_payload(&report.media_id),
        Some(b"first-second".to_vec())
    );
    assert_eq!(capture.state().await, SessionState::Idle);
}

#[tokio::test]
async fn upload_failure_tests_chunk_failure_keeps_recording_for_discard() {
    let fixture = common::fixture_engine();
    fixture.engine.login().await.expect("login should succeed");
    common::record(&fixture, &[vec![9_u8; 2_500].as_slice()]).await;
    fixture.backend.fail_chunk_transport(2, "connection reset");

    assert!(fixture.engine.upload_pending(|_| {}).await.is_err());

    let capture = fixture.engine.capture();
    assert_eq!(capture.state().await, SessionState::StoppedPendingDecision);
    capture.discard().await.expect("pending recording can be discarded");
    assert_eq!(capture.state().await, SessionState::Idle);
}
