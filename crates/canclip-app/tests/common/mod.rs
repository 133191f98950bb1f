//! Shared fixtures for app integration tests.

use std::sync::Arc;

use canclip_app::{ClipEngine, EngineConfig};
use canclip_backend::InMemoryBackend;
use canclip_capture::{SyntheticDevice, SyntheticFeed};

/// Engine wired to a synthetic device and an in-memory backend.
#[allow(dead_code)]
pub struct Fixture {
    pub engine: ClipEngine,
    pub feed: SyntheticFeed,
    pub backend: Arc<InMemoryBackend>,
}

/// Builds an engine with a small chunk size so payloads span many chunks.
#[allow(dead_code)]
pub fn fixture_engine() -> Fixture {
    let config = EngineConfig::from_lookup(|key| match key {
        "CANCLIP_CHUNK_SIZE" => Some("1000".to_string()),
        _ => None,
    })
    .expect("fixture config should load");
    let device = SyntheticDevice::new();
    let feed = device.feed();
    let backend = Arc::new(InMemoryBackend::new("principal-test"));
    let engine = ClipEngine::new(config, Arc::new(device), backend.clone())
        .expect("fixture engine should build");

    Fixture {
        engine,
        feed,
        backend,
    }
}

/// Records `fragments` through the engine's capture controller and stops.
#[allow(dead_code)]
pub async fn record(fixture: &Fixture, fragments: &[&[u8]]) -> usize {
    let capture = fixture.engine.capture();
    capture.enable_preview().await.expect("preview should open");
    capture.start_recording().await.expect("recording should start");
    for fragment in fragments {
        assert!(fixture.feed.emit(fragment.to_vec()));
    }
    capture.stop().await.expect("stop should succeed")
}
