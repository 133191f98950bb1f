//! Recording-session state machine and its shared controller.

use std::sync::Arc;
use std::time::Duration;

use canclip_core::MediaKind;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{CaptureError, MediaDevice, MediaStream, Recorder, SessionState, StreamConstraints};

/// Finished payload handed from a session to the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRecording {
    /// Media kind the session recorded.
    pub kind: MediaKind,
    /// Concatenation of every fragment in capture order.
    pub payload: Vec<u8>,
    /// Number of recorder fragments the payload was built from.
    pub fragment_count: usize,
}

impl FinishedRecording {
    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Recording session over one media device.
///
/// # Invariants
/// - Live fragments are non-empty only in `Recording`, `Paused`, or
///   `StoppedPendingDecision`.
/// - The elapsed counter advances only in `Recording`.
/// - `Idle` holds no stream.
pub struct CaptureSession {
    device: Arc<dyn MediaDevice>,
    constraints: StreamConstraints,
    kind: MediaKind,
    state: SessionState,
    stream: Option<Box<dyn MediaStream>>,
    recorder: Option<Box<dyn Recorder>>,
    fragments: Vec<Vec<u8>>,
    finished: Option<Vec<u8>>,
    elapsed_seconds: u64,
}

impl CaptureSession {
    /// Creates an idle session using the default constraints for `kind`.
    pub fn new(device: Arc<dyn MediaDevice>, kind: MediaKind) -> Self {
        Self::with_constraints(device, kind, StreamConstraints::for_kind(kind))
    }

    /// Creates an idle session with explicit stream constraints.
    pub fn with_constraints(
        device: Arc<dyn MediaDevice>,
        kind: MediaKind,
        constraints: StreamConstraints,
    ) -> Self {
        Self {
            device,
            constraints,
            kind,
            state: SessionState::Idle,
            stream: None,
            recorder: None,
            fragments: Vec::new(),
            finished: None,
            elapsed_seconds: 0,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the media kind this session records.
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Returns whole seconds spent in `Recording` since the last start.
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Returns the number of accumulated live fragments.
    pub fn live_fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Returns `true` while the device stream is held.
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns the finished payload while a decision is pending.
    pub fn finished_payload(&self) -> Option<&[u8]> {
        self.finished.as_deref()
    }

    /// Acquires the device stream and enters `Previewing`.
    ///
    /// Idempotent while already previewing.
    ///
    /// # Errors
    /// Returns [`CaptureError::Device`] when acquisition fails; the session
    /// stays `Idle`.
    pub async fn enable_preview(&mut self) -> Result<(), CaptureError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Previewing => return Ok(()),
            from => {
                return Err(CaptureError::InvalidTransition {
                    from,
                    action: "enable preview",
                });
            }
        }

        let stream = match self.device.acquire_stream(&self.constraints).await {
            Ok(stream) => stream,
            Err(error) => {
                warn!(%error, kind = %self.kind, "stream acquisition failed");
                return Err(error);
            }
        };

        info!(stream = stream.label(), kind = %self.kind, "preview enabled");
        self.stream = Some(stream);
        self.state = SessionState::Previewing;
        Ok(())
    }

    /// Attaches a recorder to the open stream and enters `Recording`.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidTransition`] unless previewing, or the
    /// recorder error when the platform refuses.
    pub fn start_recording(&mut self) -> Result<(), CaptureError> {
        self.expect_state(&[SessionState::Previewing], "start recording")?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::InvalidTransition {
                from: self.state,
                action: "start recording",
            });
        };

        let recorder = stream.start_recorder(self.kind.mime_type())?;
        self.recorder = Some(recorder);
        self.fragments.clear();
        self.finished = None;
        self.elapsed_seconds = 0;
        self.state = SessionState::Recording;
        info!(mime = self.kind.mime_type(), "recording started");
        Ok(())
    }

    /// Moves newly emitted fragments into the session while recording.
    ///
    /// Returns the number of fragments appended.
    pub fn pump(&mut self) -> usize {
        if self.state != SessionState::Recording {
            return 0;
        }
        self.collect()
    }

    /// Advances the elapsed-time counter by one second while recording.
    pub fn on_tick(&mut self) {
        if self.state == SessionState::Recording {
            self.elapsed_seconds += 1;
        }
    }

    /// Freezes accumulation and the clock without closing the stream.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidTransition`] unless recording.
    pub fn pause(&mut self) -> Result<(), CaptureError> {
        self.expect_state(&[SessionState::Recording], "pause")?;

        // Fragments emitted before the pause belong to the payload.
        self.collect();
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.pause()?;
        }

        self.state = SessionState::Paused;
        debug!(
            fragments = self.fragments.len(),
            elapsed = self.elapsed_seconds,
            "recording paused"
        );
        Ok(())
    }

    /// Re-enables accumulation and the clock.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidTransition`] unless paused.
    pub fn resume(&mut self) -> Result<(), CaptureError> {
        self.expect_state(&[SessionState::Paused], "resume")?;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.resume()?;
        }

        self.state = SessionState::Recording;
        debug!("recording resumed");
        Ok(())
    }

    /// Finalizes the fragment sequence into the finished payload.
    ///
    /// The stream stays open. Returns the payload length.
    ///
    /// # Errors
    /// - [`CaptureError::InvalidTransition`] unless recording or paused.
    /// - The recorder's error when its final flush fails. The session keeps
    ///   its state and the fragments collected so far; the caller may retry
    ///   `stop` or discard.
    pub fn stop(&mut self) -> Result<usize, CaptureError> {
        self.expect_state(&[SessionState::Recording, SessionState::Paused], "stop")?;

        self.collect();
        if let Some(mut recorder) = self.recorder.take() {
            match recorder.stop() {
                Ok(flush) => self
                    .fragments
                    .extend(flush.into_iter().filter(|fragment| !fragment.is_empty())),
                Err(error) => {
                    warn!(
                        %error,
                        state = %self.state,
                        "recorder final flush failed; recording kept"
                    );
                    self.recorder = Some(recorder);
                    return Err(error);
                }
            }
        }

        let payload = self.fragments.concat();
        let len = payload.len();
        self.finished = Some(payload);
        self.elapsed_seconds = 0;
        self.state = SessionState::StoppedPendingDecision;
        info!(
            fragments = self.fragments.len(),
            bytes = len,
            "recording stopped"
        );
        Ok(len)
    }

    /// Drops every captured fragment and returns to `Idle`.
    ///
    /// Legal at any point during `Recording`, `Paused`, or
    /// `StoppedPendingDecision`. Returns the number of fragments dropped.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidTransition`] in any other state.
    pub fn discard(&mut self) -> Result<usize, CaptureError> {
        self.expect_state(
            &[
                SessionState::Recording,
                SessionState::Paused,
                SessionState::StoppedPendingDecision,
            ],
            "discard",
        )?;

        if let Some(mut recorder) = self.recorder.take()
            && let Err(error) = recorder.stop()
        {
            debug!(%error, "recorder stop failed during discard");
        }

        let dropped = self.fragments.len();
        self.reset_to_idle();
        info!(fragments = dropped, "recording discarded");
        Ok(dropped)
    }

    /// Hands the finished payload to the caller and returns to `Idle`.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidTransition`] unless a decision is
    /// pending.
    pub fn take_recording(&mut self) -> Result<FinishedRecording, CaptureError> {
        self.expect_state(&[SessionState::StoppedPendingDecision], "hand off recording")?;

        let recording = FinishedRecording {
            kind: self.kind,
            payload: self.finished.take().unwrap_or_default(),
            fragment_count: self.fragments.len(),
        };
        self.reset_to_idle();
        info!(bytes = recording.len(), "recording handed off");
        Ok(recording)
    }

    /// Returns a copy of the finished payload without deciding its fate.
    ///
    /// The session stays in `StoppedPendingDecision`, so a failed upload of
    /// the copy can be retried or the payload discarded.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidTransition`] unless a decision is
    /// pending.
    pub fn pending_recording(&self) -> Result<FinishedRecording, CaptureError> {
        self.expect_state(&[SessionState::StoppedPendingDecision], "read pending recording")?;

        Ok(FinishedRecording {
            kind: self.kind,
            payload: self.finished.clone().unwrap_or_default(),
            fragment_count: self.fragments.len(),
        })
    }

    /// Settles a pending decision once `recording` has been stored elsewhere.
    ///
    /// Returns to `Idle` only if `recording` is still the pending payload.
    /// Returns `false`, leaving the session untouched, when it was discarded
    /// or replaced by a newer recording in the meantime.
    pub fn release_pending(&mut self, recording: &FinishedRecording) -> bool {
        let still_pending = self.state == SessionState::StoppedPendingDecision
            && self.kind == recording.kind
            && self.fragments.len() == recording.fragment_count
            && self.finished.as_deref() == Some(recording.payload.as_slice());
        if !still_pending {
            debug!(state = %self.state, "uploaded recording is no longer pending");
            return false;
        }

        self.reset_to_idle();
        info!(bytes = recording.len(), "pending recording released after upload");
        true
    }

    /// Releases the device stream.
    ///
    /// From `Previewing` the session returns to `Idle`. From
    /// `StoppedPendingDecision` the stream is released but the finished
    /// payload stays pending. A no-op while `Idle`.
    ///
    /// # Errors
    /// Returns [`CaptureError::RecordingActive`] while recording or paused.
    pub fn disable_preview(&mut self) -> Result<(), CaptureError> {
        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::Recording | SessionState::Paused => Err(CaptureError::RecordingActive),
            SessionState::Previewing => {
                self.release_stream();
                self.state = SessionState::Idle;
                Ok(())
            }
            SessionState::StoppedPendingDecision => {
                self.release_stream();
                Ok(())
            }
        }
    }

    fn collect(&mut self) -> usize {
        let Some(recorder) = self.recorder.as_mut() else {
            return 0;
        };

        let before = self.fragments.len();
        self.fragments.extend(
            recorder
                .drain_fragments()
                .into_iter()
                .filter(|fragment| !fragment.is_empty()),
        );
        self.fragments.len() - before
    }

    fn reset_to_idle(&mut self) {
        self.recorder = None;
        self.fragments.clear();
        self.finished = None;
        self.elapsed_seconds = 0;
        self.release_stream();
        self.state = SessionState::Idle;
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            info!(stream = stream.label(), "preview disabled");
        }
    }

    fn expect_state(
        &self,
        allowed: &[SessionState],
        action: &'static str,
    ) -> Result<(), CaptureError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CaptureError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release_stream();
    }
}

/// Shared handle that serializes session transitions.
///
/// The lock is held across stream acquisition, so a transition requested
/// while a preview is still being acquired waits for it to resolve.
#[derive(Clone)]
pub struct CaptureController {
    inner: Arc<Mutex<CaptureSession>>,
}

impl CaptureController {
    /// Wraps a session for shared use.
    pub fn new(session: CaptureSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// See [`CaptureSession::enable_preview`].
    pub async fn enable_preview(&self) -> Result<(), CaptureError> {
        self.inner.lock().await.enable_preview().await
    }

    /// See [`CaptureSession::start_recording`].
    pub async fn start_recording(&self) -> Result<(), CaptureError> {
        self.inner.lock().await.start_recording()
    }

    /// See [`CaptureSession::pause`].
    pub async fn pause(&self) -> Result<(), CaptureError> {
        self.inner.lock().await.pause()
    }

    /// See [`CaptureSession::resume`].
    pub async fn resume(&self) -> Result<(), CaptureError> {
        self.inner.lock().await.resume()
    }

    /// See [`CaptureSession::stop`].
    pub async fn stop(&self) -> Result<usize, CaptureError> {
        self.inner.lock().await.stop()
    }

    /// See [`CaptureSession::discard`].
    pub async fn discard(&self) -> Result<usize, CaptureError> {
        self.inner.lock().await.discard()
    }

    /// See [`CaptureSession::take_recording`].
    pub async fn take_recording(&self) -> Result<FinishedRecording, CaptureError> {
        self.inner.lock().await.take_recording()
    }

    /// See [`CaptureSession::pending_recording`].
    pub async fn pending_recording(&self) -> Result<FinishedRecording, CaptureError> {
        self.inner.lock().await.pending_recording()
    }

    /// See [`CaptureSession::release_pending`].
    pub async fn release_pending(&self, recording: &FinishedRecording) -> bool {
        self.inner.lock().await.release_pending(recording)
    }

    /// See [`CaptureSession::disable_preview`].
    pub async fn disable_preview(&self) -> Result<(), CaptureError> {
        self.inner.lock().await.disable_preview()
    }

    /// See [`CaptureSession::pump`].
    pub async fn pump(&self) -> usize {
        self.inner.lock().await.pump()
    }

    /// Returns the current state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state()
    }

    /// Returns the elapsed recording time in seconds.
    pub async fn elapsed_seconds(&self) -> u64 {
        self.inner.lock().await.elapsed_seconds()
    }

    /// Returns the number of accumulated live fragments.
    pub async fn live_fragment_count(&self) -> usize {
        self.inner.lock().await.live_fragment_count()
    }

    /// Spawns a task that pumps fragments and advances the clock every
    /// `period`. Abort the handle to stop it.
    pub fn spawn_ticker(&self, period: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut session = inner.lock().await;
                session.pump();
                session.on_tick();
            }
        })
    }
}
