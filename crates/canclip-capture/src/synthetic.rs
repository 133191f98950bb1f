//! Deterministic in-process device for CI and unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{CaptureError, MediaDevice, MediaStream, Recorder, StreamConstraints};

#[derive(Debug, Default)]
struct FeedState {
    recorder_active: bool,
    paused: bool,
    pending: Vec<Vec<u8>>,
    open_streams: usize,
    acquisitions: usize,
    last_mime_type: Option<String>,
    last_constraints: Option<StreamConstraints>,
}

/// Test-side handle that plays the role of the platform recorder.
///
/// Fragments pushed through [`SyntheticFeed::emit`] are only accepted while a
/// recorder is attached and not paused.
#[derive(Debug, Clone, Default)]
pub struct SyntheticFeed {
    state: Arc<Mutex<FeedState>>,
}

impl SyntheticFeed {
    /// Emits one fragment. Returns `false` when no active recorder took it.
    pub fn emit(&self, fragment: impl Into<Vec<u8>>) -> bool {
        let mut state = self.state.lock();
        if !state.recorder_active || state.paused {
            return false;
        }
        state.pending.push(fragment.into());
        true
    }

    /// Returns the number of streams acquired and not yet closed.
    pub fn open_streams(&self) -> usize {
        self.state.lock().open_streams
    }

    /// Returns how many streams were ever acquired.
    pub fn acquisitions(&self) -> usize {
        self.state.lock().acquisitions
    }

    /// Returns the mime type requested by the most recent recorder.
    pub fn last_mime_type(&self) -> Option<String> {
        self.state.lock().last_mime_type.clone()
    }

    /// Returns the constraints of the most recent acquisition.
    pub fn last_constraints(&self) -> Option<StreamConstraints> {
        self.state.lock().last_constraints
    }
}

/// Releases a gated [`SyntheticDevice`] acquisition.
#[derive(Debug, Clone)]
pub struct DeviceGate(Arc<Notify>);

impl DeviceGate {
    /// Lets one pending (or the next) acquisition complete.
    pub fn open(&self) {
        self.0.notify_one();
    }
}

/// Synthetic device producing fragments supplied by a [`SyntheticFeed`].
#[derive(Debug, Default)]
pub struct SyntheticDevice {
    feed: SyntheticFeed,
    denial: Option<String>,
    gate: Option<Arc<Notify>>,
}

impl SyntheticDevice {
    /// Creates a device that grants every acquisition immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device that refuses every acquisition with `reason`.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            denial: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Creates a device whose acquisitions wait until the gate opens.
    pub fn gated() -> (Self, DeviceGate) {
        let notify = Arc::new(Notify::new());
        let device = Self {
            gate: Some(Arc::clone(&notify)),
            ..Self::default()
        };
        (device, DeviceGate(notify))
    }

    /// Returns the feed shared with every stream this device opens.
    pub fn feed(&self) -> SyntheticFeed {
        self.feed.clone()
    }
}

#[async_trait]
impl MediaDevice for SyntheticDevice {
    async fn acquire_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if let Some(reason) = &self.denial {
            return Err(CaptureError::Device(reason.clone()));
        }

        let mut state = self.feed.state.lock();
        state.open_streams += 1;
        state.acquisitions += 1;
        state.last_constraints = Some(*constraints);
        let label = format!("synthetic-stream-{}", state.acquisitions);
        drop(state);

        Ok(Box::new(SyntheticStream {
            label,
            feed: self.feed.clone(),
            closed: false,
        }))
    }
}

struct SyntheticStream {
    label: String,
    feed: SyntheticFeed,
    closed: bool,
}

impl MediaStream for SyntheticStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn start_recorder(&mut self, mime_type: &str) -> Result<Box<dyn Recorder>, CaptureError> {
        if self.closed {
            return Err(CaptureError::Recorder("stream is closed".to_string()));
        }

        let mut state = self.feed.state.lock();
        state.recorder_active = true;
        state.paused = false;
        state.pending.clear();
        state.last_mime_type = Some(mime_type.to_string());
        drop(state);

        Ok(Box::new(SyntheticRecorder {
            feed: self.feed.clone(),
        }))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.feed.state.lock();
        state.open_streams = state.open_streams.saturating_sub(1);
        state.recorder_active = false;
    }
}

struct SyntheticRecorder {
    feed: SyntheticFeed,
}

impl Recorder for SyntheticRecorder {
    fn pause(&mut self) -> Result<(), CaptureError> {
        self.feed.state.lock().paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        self.feed.state.lock().paused = false;
        Ok(())
    }

    fn drain_fragments(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.feed.state.lock().pending)
    }

    fn stop(&mut self) -> Result<Vec<Vec<u8>>, CaptureError> {
        let mut state = self.feed.state.lock();
        state.recorder_active = false;
        state.paused = false;
        Ok(std::mem::take(&mut state.pending))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for synthetic device behavior.

    use canclip_core::MediaKind;

    use super::*;

    #[tokio::test]
    async fn feed_rejects_fragments_without_recorder() {
        let device = SyntheticDevice::new();
        let feed = device.feed();
        assert!(!feed.emit(vec![1]));

        let mut stream = device
            .acquire_stream(&StreamConstraints::for_kind(MediaKind::Audio))
            .await
            .expect("acquisition should work");
        let mut recorder = stream.start_recorder("audio/webm").expect("recorder should start");
        assert!(feed.emit(vec![1, 2]));
        assert_eq!(recorder.drain_fragments(), vec![vec![1, 2]]);

        stream.close();
        assert_eq!(feed.open_streams(), 0);
    }
}
