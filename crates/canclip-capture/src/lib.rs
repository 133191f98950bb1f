#![warn(missing_docs)]
//! # canclip-capture
//!
//! ## Purpose
//! Governs when media may be previewed, recorded, paused, discarded, or
//! finalized, on top of an abstract device and recorder.
//!
//! ## Responsibilities
//! - Define backend-agnostic device, stream, and recorder traits.
//! - Drive the recording-session state machine ([`CaptureSession`]).
//! - Serialize transitions for shared callers ([`CaptureController`]).
//! - Expose a deterministic synthetic device for CI and unit tests.
//!
//! ## Data flow
//! [`MediaDevice::acquire_stream`] opens a [`MediaStream`] -> the stream
//! starts a [`Recorder`] -> recorder fragments accumulate in capture order ->
//! on stop they are concatenated once into the finished payload -> the payload
//! leaves the session as a [`FinishedRecording`].
//!
//! ## Ownership and lifetimes
//! The session exclusively owns the device stream from preview enable to
//! preview disable (or until the session returns to `Idle`). Finished
//! recordings are owned buffers so a failed upload can be retried without the
//! session.
//!
//! ## Error model
//! Device denial surfaces as [`CaptureError::Device`]. Illegal transitions
//! return [`CaptureError::InvalidTransition`] and leave state unchanged.
//!
//! ## Security and privacy notes
//! Fragment bytes are never logged; only counts and sizes are.

mod session;
mod synthetic;

use std::fmt;

use async_trait::async_trait;
use canclip_core::MediaKind;
use thiserror::Error;

pub use session::{CaptureController, CaptureSession, FinishedRecording};
pub use synthetic::{DeviceGate, SyntheticDevice, SyntheticFeed};

/// Camera facing preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Front camera.
    User,
    /// Rear camera.
    Environment,
}

/// Requested video track shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    /// Ideal width in pixels.
    pub width: u32,
    /// Ideal height in pixels.
    pub height: u32,
    /// Preferred camera.
    pub facing: Facing,
}

/// Constraints used when acquiring a device stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Video track request; `None` for audio-only capture.
    pub video: Option<VideoConstraints>,
    /// Whether to capture a microphone track.
    pub audio: bool,
}

impl StreamConstraints {
    /// Returns the default constraints for `kind`.
    pub fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => Self {
                video: Some(VideoConstraints {
                    width: 1280,
                    height: 720,
                    facing: Facing::User,
                }),
                audio: true,
            },
            MediaKind::Audio => Self {
                video: None,
                audio: true,
            },
        }
    }
}

/// Recording-session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stream is held.
    Idle,
    /// Stream is open; nothing is being recorded.
    Previewing,
    /// Recorder is attached and accumulating fragments.
    Recording,
    /// Recorder is attached but accumulation and the clock are frozen.
    Paused,
    /// Finished payload awaits a discard or upload decision.
    StoppedPendingDecision,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Previewing => "previewing",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::StoppedPendingDecision => "stopped",
        };
        f.write_str(name)
    }
}

/// Platform device able to open live audio/video streams.
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Opens a live stream. The future resolves exactly when the stream is
    /// ready or acquisition has failed.
    ///
    /// # Errors
    /// Returns [`CaptureError::Device`] when the device is denied or
    /// unavailable.
    async fn acquire_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError>;
}

/// An open device stream.
pub trait MediaStream: Send {
    /// Human-readable stream label for logs.
    fn label(&self) -> &str;

    /// Attaches a recorder emitting fragments in `mime_type` container format.
    ///
    /// # Errors
    /// Returns [`CaptureError::Recorder`] when the platform refuses.
    fn start_recorder(&mut self, mime_type: &str) -> Result<Box<dyn Recorder>, CaptureError>;

    /// Stops all tracks and releases the device.
    fn close(&mut self);
}

/// Recorder bound to a stream.
pub trait Recorder: Send {
    /// Stops fragment emission without closing the stream.
    ///
    /// # Errors
    /// Returns [`CaptureError::Recorder`] on platform failure.
    fn pause(&mut self) -> Result<(), CaptureError>;

    /// Re-enables fragment emission.
    ///
    /// # Errors
    /// Returns [`CaptureError::Recorder`] on platform failure.
    fn resume(&mut self) -> Result<(), CaptureError>;

    /// Returns fragments emitted since the previous drain, in capture order.
    fn drain_fragments(&mut self) -> Vec<Vec<u8>>;

    /// Stops recording and returns the final flush.
    ///
    /// # Errors
    /// Returns [`CaptureError::Recorder`] when the final flush is lost.
    fn stop(&mut self) -> Result<Vec<Vec<u8>>, CaptureError>;
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Camera or microphone is unavailable or denied.
    #[error("capture device unavailable: {0}")]
    Device(String),
    /// Requested action is not legal in the current state.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        /// State at the time of the request.
        from: SessionState,
        /// Requested action.
        action: &'static str,
    },
    /// Preview cannot be disabled while a recording is in progress.
    #[error("recording in progress; stop it before disabling preview")]
    RecordingActive,
    /// Recorder runtime failure.
    #[error("recorder failure: {0}")]
    Recorder(String),
}
