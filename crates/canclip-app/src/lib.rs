#![warn(missing_docs)]
//! # canclip-app
//!
//! ## Purpose
//! Orchestrates capture, sign-in, chunked transfer, and playback for
//! `canclip`.
//!
//! ## Responsibilities
//! - Load [`EngineConfig`] from `CANCLIP_*` environment variables.
//! - Gate backend-facing operations on an authenticated caller.
//! - Hand stopped recordings to the upload pipeline under a generated name.
//! - Hand out scoped [`PlaybackHandle`]s over reassembled payloads.
//! - Install the process-wide tracing subscriber.
//!
//! ## Data flow
//! Device stream -> [`canclip_capture::CaptureController`] -> finished
//! payload -> [`ClipEngine::upload_pending`] -> backend -> media list ->
//! [`ClipEngine::open_playback`] -> [`PlaybackHandle`].
//!
//! ## Ownership and lifetimes
//! The engine owns one capture controller and one registry; pipelines share
//! the backend through `Arc`. Playback handles own their bytes and release
//! their locator on drop.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`] with `#[from]`
//! conversions so callers can match on the originating stage.
//!
//! ## Security and privacy notes
//! - Uploads, listings, deletes and playback require a signed-in caller.
//! - Logging out clears the cached media list.
//! - Payload bytes are never logged.

mod config;
mod engine;
mod playback;

use canclip_auth::AuthError;
use canclip_capture::CaptureError;
use canclip_core::MediaId;
use canclip_transfer::{RegistryError, TransferError};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub use config::{
    ENV_CHUNK_SIZE, ENV_LOCAL_IDENTITY_CANISTER, ENV_MEDIA_KIND, ENV_NETWORK, ENV_ORPHAN_POLICY,
    EngineConfig,
};
pub use engine::ClipEngine;
pub use playback::PlaybackHandle;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("CANCLIP_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration is malformed.
    #[error("config error: {0}")]
    Config(String),
    /// Operation requires a signed-in caller.
    #[error("not authenticated")]
    NotAuthenticated,
    /// Media id is not in the cached list.
    #[error("unknown media: {0}")]
    UnknownMedia(MediaId),
    /// Auth subsystem error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    /// Capture subsystem error.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Upload or download error.
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    /// Media list refresh or delete error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}
