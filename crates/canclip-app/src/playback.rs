//! Scoped playback handles over reassembled payloads.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use canclip_core::{MediaId, MediaKind};
use canclip_transfer::ReassembledPayload;
use parking_lot::Mutex;
use tracing::debug;

/// Book-keeping for every handle an engine has handed out.
#[derive(Debug, Default)]
pub(crate) struct PlaybackTracker {
    next_sequence: AtomicU64,
    active: Mutex<BTreeSet<String>>,
}

impl PlaybackTracker {
    pub(crate) fn active(&self) -> usize {
        self.active.lock().len()
    }

    fn release(&self, locator: &str) {
        if self.active.lock().remove(locator) {
            debug!(%locator, "playback released");
        }
    }
}

/// A reassembled payload ready for presentation.
///
/// The locator stays valid until the handle is dropped; dropping it releases
/// the playback resource exactly once.
#[derive(Debug)]
pub struct PlaybackHandle {
    locator: String,
    payload: ReassembledPayload,
    tracker: Arc<PlaybackTracker>,
}

impl PlaybackHandle {
    pub(crate) fn open(tracker: &Arc<PlaybackTracker>, payload: ReassembledPayload) -> Self {
        let sequence = tracker.next_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let locator = format!("blob:canclip/{}/{sequence}", payload.media_id);
        tracker.active.lock().insert(locator.clone());
        debug!(%locator, bytes = payload.len(), "playback opened");

        Self {
            locator,
            payload,
            tracker: Arc::clone(tracker),
        }
    }

    /// Returns the `blob:`-style locator for this playback.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Returns the media this playback was built from.
    pub fn media_id(&self) -> &MediaId {
        &self.payload.media_id
    }

    /// Returns the declared media kind.
    pub fn kind(&self) -> MediaKind {
        self.payload.kind
    }

    /// Returns the presentation mime type.
    pub fn mime_type(&self) -> &'static str {
        self.payload.mime_type()
    }

    /// Returns the reassembled bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.payload.bytes
    }

    /// Returns the hex SHA-256 of the reassembled bytes.
    pub fn sha256(&self) -> &str {
        &self.payload.sha256
    }

    /// Returns the payload length.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` when the payload holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.tracker.release(&self.locator);
    }
}
