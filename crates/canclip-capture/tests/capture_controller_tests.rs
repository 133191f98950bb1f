//! Integration tests for serialized transitions through the shared controller.

use std::sync::Arc;
use std::time::Duration;

use canclip_capture::{CaptureController, CaptureSession, SessionState, SyntheticDevice};
use canclip_core::MediaKind;

#[tokio::test]
async fn capture_controller_tests_start_waits_for_pending_preview() {
    let (device, gate) = SyntheticDevice::gated();
    let feed = device.feed();
    let session = CaptureSession::new(Arc::new(device), MediaKind::Video);
    let controller = CaptureController::new(session);

    let preview = tokio::spawn({
        let controller = controller.clone();
        async move { controller.enable_preview().await }
    });
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    let start = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start_recording().await }
    });
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert!(!preview.is_finished());
    assert!(!start.is_finished(), "start must wait for acquisition");

    gate.open();
    preview
        .await
        .expect("preview task should join")
        .expect("preview should open");
    start
        .await
        .expect("start task should join")
        .expect("recording should start after preview");

    assert_eq!(controller.state().await, SessionState::Recording);
    assert_eq!(feed.acquisitions(), 1);
}

#[tokio::test(start_paused = true)]
async fn capture_controller_tests_ticker_pumps_and_counts_seconds() {
    let device = SyntheticDevice::new();
    let feed = device.feed();
    let session = CaptureSession::new(Arc::new(device), MediaKind::Video);
    let controller = CaptureController::new(session);

    controller.enable_preview().await.expect("preview should open");
    controller.start_recording().await.expect("recording should start");
    let ticker = controller.spawn_ticker(Duration::from_secs(1));

    assert!(feed.emit(vec![1_u8; 8]));
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    ticker.abort();

    assert_eq!(controller.elapsed_seconds().await, 3);
    assert_eq!(controller.live_fragment_count().await, 1);
}
