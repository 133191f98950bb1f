#![warn(missing_docs)]
//! # canclip-app binary
//!
//! Runs one synthetic capture -> upload -> playback round trip against the
//! in-memory backend and reports whether the bytes came back unchanged.

use std::sync::Arc;

use canclip_app::{AppError, ClipEngine, EngineConfig, app_version, init_tracing};
use canclip_backend::InMemoryBackend;
use canclip_capture::SyntheticDevice;
use canclip_core::format_file_size;
use tracing::{error, info};

const DEMO_PRINCIPAL: &str = "2vxsx-fae";
const DEMO_FRAGMENTS: usize = 24;
const DEMO_FRAGMENT_LEN: usize = 64 * 1024;

/// CLI entry point.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    info!(version = app_version(), "canclip starting");

    if let Err(error) = run().await {
        error!(%error, "round trip failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = EngineConfig::from_env()?;
    let device = SyntheticDevice::new();
    let feed = device.feed();
    let backend = Arc::new(InMemoryBackend::new(DEMO_PRINCIPAL));
    let engine = ClipEngine::new(config, Arc::new(device), backend)?;

    let user = engine.login().await?;
    info!(principal = %user.principal, "signed in");

    let capture = engine.capture();
    capture.enable_preview().await?;
    capture.start_recording().await?;
    for index in 0..DEMO_FRAGMENTS {
        feed.emit(vec![(index % 251) as u8; DEMO_FRAGMENT_LEN]);
        capture.pump().await;
    }
    let recorded = capture.stop().await?;
    info!(size = %format_file_size(recorded as u64), "recording stopped");

    let report = engine
        .upload_pending(|progress| {
            info!(
                media_id = %progress.media_id,
                percent = progress.percent,
                "upload progress"
            );
        })
        .await?;

    let playback = engine.open_playback(&report.media_id).await?;
    info!(
        locator = playback.locator(),
        mime_type = playback.mime_type(),
        size = %format_file_size(playback.len() as u64),
        matches = playback.sha256() == report.sha256,
        "playback ready"
    );
    drop(playback);

    engine.delete_media(&report.media_id).await?;
    info!(remaining = engine.media().len(), "round trip complete");
    engine.logout();
    Ok(())
}
