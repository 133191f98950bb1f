//! Orchestration of capture, sign-in, transfer, and playback.

use std::sync::Arc;

use canclip_auth::{AuthClient, AuthStateMachine, UserProfile};
use canclip_backend::MediaBackend;
use canclip_capture::{CaptureController, CaptureSession, FinishedRecording, MediaDevice};
use canclip_core::{MediaDescriptor, MediaId, recording_name};
use canclip_transfer::{
    DownloadPipeline, MediaRegistry, UploadPipeline, UploadProgress, UploadReport,
};
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::playback::{PlaybackHandle, PlaybackTracker};
use crate::{AppError, EngineConfig};

/// One user's capture and transfer engine.
///
/// Cloning is not supported; share it behind an `Arc`. Backend-facing calls
/// other than sign-in require an authenticated caller.
pub struct ClipEngine {
    config: EngineConfig,
    capture: CaptureController,
    auth_client: AuthClient,
    auth: Mutex<AuthStateMachine>,
    registry: Arc<MediaRegistry>,
    uploader: UploadPipeline,
    downloader: DownloadPipeline,
    playbacks: Arc<PlaybackTracker>,
}

impl ClipEngine {
    /// Wires an engine over `device` and `backend`.
    ///
    /// # Errors
    /// Returns [`AppError::Transfer`] for an invalid chunk size and
    /// [`AppError::Auth`] for a rejected identity provider.
    pub fn new(
        config: EngineConfig,
        device: Arc<dyn MediaDevice>,
        backend: Arc<dyn MediaBackend>,
    ) -> Result<Self, AppError> {
        let registry = Arc::new(MediaRegistry::new(Arc::clone(&backend)));
        let uploader = UploadPipeline::new(Arc::clone(&backend), config.chunk_size)?
            .with_orphan_policy(config.orphan_policy)
            .with_registry(Arc::clone(&registry));
        let auth_client =
            AuthClient::new(config.identity_provider.as_str(), Arc::clone(&backend))?;
        let session =
            CaptureSession::with_constraints(device, config.media_kind, config.constraints);

        Ok(Self {
            capture: CaptureController::new(session),
            auth_client,
            auth: Mutex::new(AuthStateMachine::new()),
            registry,
            uploader,
            downloader: DownloadPipeline::new(backend),
            playbacks: Arc::new(PlaybackTracker::default()),
            config,
        })
    }

    /// Returns the configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the shared capture controller.
    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    /// Resolves the caller through the backend and loads their media list.
    ///
    /// A failing listing is logged; the caller stays signed in with an empty
    /// list and may [`ClipEngine::refresh_media`] later.
    ///
    /// # Errors
    /// Returns [`AppError::Auth`] when the backend does not recognise the
    /// caller.
    pub async fn login(&self) -> Result<UserProfile, AppError> {
        let user = self.auth_client.authenticate().await?;
        self.auth.lock().on_authenticated(user.clone());

        if let Err(error) = self.registry.refresh().await {
            warn!(%error, "initial media listing failed");
        }
        Ok(user)
    }

    /// Signs out and drops the cached media list.
    pub fn logout(&self) {
        self.auth.lock().logout();
        self.registry.clear();
        info!("signed out");
    }

    /// Returns `true` while a caller is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.auth.lock().is_authenticated()
    }

    /// Returns the signed-in caller.
    pub fn user(&self) -> Option<UserProfile> {
        self.auth.lock().user().cloned()
    }

    /// Uploads the stopped recording and then releases it from the session.
    ///
    /// The session stays in `StoppedPendingDecision` while the upload runs
    /// and after it fails, so the caller can retry or discard. It returns to
    /// `Idle` only once the upload succeeded.
    ///
    /// # Errors
    /// - [`AppError::NotAuthenticated`] with the session left untouched.
    /// - [`AppError::Capture`] when no recording is pending.
    /// - [`AppError::Transfer`] from the upload itself; the recording stays
    ///   pending.
    pub async fn upload_pending<F>(&self, on_progress: F) -> Result<UploadReport, AppError>
    where
        F: FnMut(UploadProgress) + Send,
    {
        self.require_authenticated()?;
        let recording = self.capture.pending_recording().await?;
        let report = self.upload_recording(&recording, on_progress).await?;
        if !self.capture.release_pending(&recording).await {
            warn!(
                media_id = %report.media_id,
                "session changed during upload; leaving it as is"
            );
        }
        Ok(report)
    }

    /// Uploads an already handed-off recording under a fresh
    /// `Recording_<millis>` name.
    ///
    /// # Errors
    /// Same as [`ClipEngine::upload_pending`], minus the capture error.
    pub async fn upload_recording<F>(
        &self,
        recording: &FinishedRecording,
        on_progress: F,
    ) -> Result<UploadReport, AppError>
    where
        F: FnMut(UploadProgress) + Send,
    {
        self.require_authenticated()?;
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let name = recording_name(now_ms);

        let report = self
            .uploader
            .upload_with_progress(&name, recording.kind, &recording.payload, on_progress)
            .await?;
        info!(
            media_id = %report.media_id,
            name = %report.name,
            chunks = report.chunk_count,
            "recording uploaded"
        );
        Ok(report)
    }

    /// Reloads the media list from the backend.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] or [`AppError::Registry`].
    pub async fn refresh_media(&self) -> Result<usize, AppError> {
        self.require_authenticated()?;
        Ok(self.registry.refresh().await?)
    }

    /// Returns the cached media list.
    pub fn media(&self) -> Arc<Vec<MediaDescriptor>> {
        self.registry.snapshot()
    }

    /// Deletes `media_id` and reloads the list.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] or [`AppError::Registry`]; a
    /// refused delete leaves the cached list unchanged.
    pub async fn delete_media(&self, media_id: &MediaId) -> Result<(), AppError> {
        self.require_authenticated()?;
        Ok(self.registry.delete(media_id).await?)
    }

    /// Downloads `media_id` and returns a scoped playback handle.
    ///
    /// # Errors
    /// - [`AppError::UnknownMedia`] when the id is not in the cached list.
    /// - [`AppError::Transfer`] when reassembly fails; no handle is created.
    pub async fn open_playback(&self, media_id: &MediaId) -> Result<PlaybackHandle, AppError> {
        self.require_authenticated()?;
        let descriptor = self
            .registry
            .find(media_id)
            .ok_or_else(|| AppError::UnknownMedia(media_id.clone()))?;

        let payload = self.downloader.fetch(&descriptor).await?;
        Ok(PlaybackHandle::open(&self.playbacks, payload))
    }

    /// Returns the number of playback handles not yet dropped.
    pub fn active_playbacks(&self) -> usize {
        self.playbacks.active()
    }

    fn require_authenticated(&self) -> Result<(), AppError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AppError::NotAuthenticated)
        }
    }
}
